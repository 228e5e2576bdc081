//! Address space
//!
//! Owns the address tree and resolves patterns against it. Registration
//! splits an address into literal names; lookup parses the pattern and
//! expands a frontier of matched nodes one component at a time, starting at
//! the root.
//!
//! `AddressSpace` does no locking of its own: mutation takes `&mut self`.
//! Use [`crate::SharedAddressSpace`] to register and dispatch from different
//! threads.

use std::net::SocketAddr;
use std::sync::Arc;

use rosc::{OscMessage, OscPacket, OscType};
use tracing::{debug, trace, warn};

use crate::config::AddressSpaceConfig;
use crate::node::{Method, MethodId, Node};
use crate::pattern::{split_path, AddressPattern};
use crate::{Error, Result};

/// Transport metadata handed through to callbacks unmodified
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchContext {
    /// Remote host/port the message came from
    pub peer: Option<SocketAddr>,
}

impl DispatchContext {
    pub fn from_peer(peer: SocketAddr) -> Self {
        Self { peer: Some(peer) }
    }
}

/// One callback invocation
#[derive(Debug)]
pub struct MethodCall<'a> {
    /// The method being invoked
    pub method: MethodId,
    pub message: &'a OscMessage,
    pub context: &'a DispatchContext,
}

impl MethodCall<'_> {
    /// Message arguments
    pub fn args(&self) -> &[OscType] {
        &self.message.args
    }

    /// The address pattern the sender used
    pub fn pattern(&self) -> &str {
        &self.message.addr
    }
}

/// Method callback
pub type Callback = Arc<dyn Fn(&MethodCall<'_>) + Send + Sync>;

/// Matched method with its callback, resolved ahead of invocation
pub(crate) type Target = (MethodId, Option<Callback>);

/// Registry of OSC methods
#[derive(Debug)]
pub struct AddressSpace {
    root: Node,
    config: AddressSpaceConfig,
}

impl AddressSpace {
    pub fn new() -> Self {
        Self::with_config(AddressSpaceConfig::default())
    }

    pub fn with_config(config: AddressSpaceConfig) -> Self {
        Self {
            root: Node::root(),
            config,
        }
    }

    pub fn config(&self) -> &AddressSpaceConfig {
        &self.config
    }

    /// The anonymous root node
    pub fn root(&self) -> &Node {
        &self.root
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a method at `address`
    ///
    /// Path segments are taken literally. An empty address or an invalid name
    /// yields [`MethodId::UNMATCHABLE`]; use [`AddressSpace::try_register`]
    /// to get the reason.
    pub fn register(&mut self, address: &str, callback: Option<Callback>) -> MethodId {
        match self.try_register(address, callback) {
            Ok(id) => id,
            Err(e) => {
                warn!("Rejected registration of {:?}: {}", address, e);
                MethodId::UNMATCHABLE
            }
        }
    }

    /// Register a method at `address`, reporting invalid addresses
    pub fn try_register(&mut self, address: &str, callback: Option<Callback>) -> Result<MethodId> {
        let path = split_path(address);
        if path.is_empty() {
            return Err(Error::EmptyAddress);
        }

        let id = self.root.create_method_node(
            &path,
            Method::new(callback),
            self.config.replace_existing,
            self.config.strict_names,
        )?;

        debug!("Registered {} as {}", address, id);
        Ok(id)
    }

    /// Register a closure at `address`
    pub fn register_fn<F>(&mut self, address: &str, f: F) -> MethodId
    where
        F: Fn(&MethodCall<'_>) + Send + Sync + 'static,
    {
        self.register(address, Some(Arc::new(f)))
    }

    /// Unregister the method at `address`
    ///
    /// A method node that still has children becomes a plain container so
    /// the addresses below it stay registered. Fails for an address that only
    /// names a container.
    pub fn unregister(&mut self, address: &str) -> bool {
        self.unregister_path(&split_path(address))
    }

    /// Unregister a method by identity
    pub fn unregister_method(&mut self, id: MethodId) -> bool {
        let Some(path) = self.root.path_of_method(id) else {
            return false;
        };
        let path: Vec<&str> = path.iter().map(String::as_str).collect();
        self.unregister_path(&path)
    }

    /// Unregister the method at `address` and remove containers left empty
    pub fn unregister_and_prune(&mut self, address: &str) -> bool {
        let path = split_path(address);
        if !self.unregister_path(&path) {
            return false;
        }

        let ancestors = &path[..path.len() - 1];
        let Some(nodes) = self.root.find_path_nodes(ancestors, false) else {
            return true;
        };

        // Walk up while each ancestor only holds the dead chain below it
        let mut top = nodes.len();
        for (i, node) in nodes.iter().enumerate().rev() {
            let allowed = usize::from(i + 1 != nodes.len());
            if node.is_method() || node.children().len() > allowed {
                break;
            }
            top = i;
        }

        if top < ancestors.len() {
            self.root.remove_method_node(&ancestors[..=top], true);
            debug!("Pruned {} empty containers above {}", ancestors.len() - top, address);
        }
        true
    }

    /// Remove every method and container
    pub fn unregister_all(&mut self) {
        self.root = Node::root();
        debug!("Cleared address space");
    }

    fn unregister_path(&mut self, path: &[&str]) -> bool {
        let is_method = self
            .root
            .find_method_node(path)
            .is_some_and(Node::is_method);
        if !is_method {
            return false;
        }

        if self.root.remove_method_node(path, false) {
            debug!("Unregistered /{}", path.join("/"));
            return true;
        }

        let demoted = self
            .root
            .find_node_mut(path)
            .and_then(Node::take_method)
            .is_some();
        if demoted {
            debug!("Unregistered /{} (kept as container)", path.join("/"));
        }
        demoted
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Methods matching `pattern`
    ///
    /// A pattern rejected by the configured [`crate::RangePolicy`] matches
    /// nothing; use [`AddressSpace::try_methods`] to see why.
    pub fn methods(&self, pattern: &str) -> Vec<MethodId> {
        match self.try_methods(pattern) {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Rejected pattern {:?}: {}", pattern, e);
                Vec::new()
            }
        }
    }

    /// Methods matching `pattern`, reporting malformed patterns
    pub fn try_methods(&self, pattern: &str) -> Result<Vec<MethodId>> {
        let pattern = self.parse(pattern)?;
        Ok(self.methods_for(&pattern))
    }

    /// Methods matching an already parsed pattern
    pub fn methods_for(&self, pattern: &AddressPattern) -> Vec<MethodId> {
        self.resolve(pattern)
            .into_iter()
            .filter_map(Node::method_id)
            .collect()
    }

    /// Check if a method is registered at exactly `address`
    pub fn contains(&self, address: &str) -> bool {
        self.root
            .find_method_node(&split_path(address))
            .is_some_and(Node::is_method)
    }

    /// Address of the method with identity `id`
    pub fn address_of(&self, id: MethodId) -> Option<String> {
        self.root
            .path_of_method(id)
            .map(|path| format!("/{}", path.join("/")))
    }

    /// Addresses of all registered methods, in tree order
    pub fn addresses(&self) -> Vec<String> {
        self.collect_methods()
            .into_iter()
            .map(|(address, _)| address)
            .collect()
    }

    /// Number of registered methods
    pub fn len(&self) -> usize {
        self.root.method_count()
    }

    /// Check if no method is registered; leftover containers do not count
    pub fn is_empty(&self) -> bool {
        !self.root.has_methods()
    }

    fn collect_methods(&self) -> Vec<(String, MethodId)> {
        let mut out = Vec::new();
        self.root.collect_methods("", &mut out);
        out
    }

    fn parse(&self, pattern: &str) -> Result<AddressPattern> {
        AddressPattern::parse_with(pattern, &self.config.pattern_options())
    }

    /// Nodes (methods and containers) reached by every component of `pattern`
    fn resolve(&self, pattern: &AddressPattern) -> Vec<&Node> {
        let components = pattern.components();
        if components.is_empty() {
            return Vec::new();
        }

        let mut frontier = vec![&self.root];
        for component in components {
            frontier = frontier
                .into_iter()
                .flat_map(|node| node.find_pattern_matches(component))
                .collect();

            trace!("Component {:?} matched {} nodes", component.as_str(), frontier.len());
            if frontier.is_empty() {
                break;
            }
        }

        frontier
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Invoke every callback whose method matches `message.addr`
    ///
    /// Returns all matched methods, including those without a callback.
    pub fn dispatch(&self, message: &OscMessage, context: &DispatchContext) -> Vec<MethodId> {
        let targets = self.targets(&message.addr);
        invoke(&targets, message, context);
        targets.into_iter().map(|(id, _)| id).collect()
    }

    /// Dispatch every message of a packet; bundles are flattened in order
    ///
    /// Bundle time tags are not interpreted: contents dispatch immediately.
    pub fn dispatch_packet(&self, packet: &OscPacket, context: &DispatchContext) -> Vec<MethodId> {
        flatten_packet(packet)
            .into_iter()
            .flat_map(|message| self.dispatch(message, context))
            .collect()
    }

    pub(crate) fn targets(&self, pattern: &str) -> Vec<Target> {
        let pattern = match self.parse(pattern) {
            Ok(pattern) => pattern,
            Err(e) => {
                warn!("Rejected pattern {:?}: {}", pattern, e);
                return Vec::new();
            }
        };

        self.resolve(&pattern)
            .into_iter()
            .filter_map(|node| node.method())
            .map(|method| (method.id, method.callback.clone()))
            .collect()
    }

    #[cfg(test)]
    fn matched_node_count(&self, pattern: &str) -> usize {
        self.resolve(&AddressPattern::parse(pattern)).len()
    }
}

impl Default for AddressSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the callbacks of resolved targets in order
pub(crate) fn invoke(targets: &[Target], message: &OscMessage, context: &DispatchContext) {
    let mut invoked = 0;
    for (id, callback) in targets {
        if let Some(callback) = callback {
            callback(&MethodCall {
                method: *id,
                message,
                context,
            });
            invoked += 1;
        }
    }
    debug!(
        "Dispatched {} to {} of {} matched methods",
        message.addr,
        invoked,
        targets.len()
    );
}

/// Messages of a packet in order, descending into nested bundles
pub(crate) fn flatten_packet(packet: &OscPacket) -> Vec<&OscMessage> {
    match packet {
        OscPacket::Message(message) => vec![message],
        OscPacket::Bundle(bundle) => bundle.content.iter().flat_map(flatten_packet).collect(),
    }
}
