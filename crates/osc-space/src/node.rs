//! Address tree
//!
//! Every registered address is a path from the anonymous root through named
//! nodes. A node is a container (has children), a method (carries a
//! [`Method`]), or both. Each node owns its children, so the tree is a strict
//! hierarchy.

use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::pattern::{tokenize, Component};
use crate::space::Callback;
use crate::{Error, Result, PATH_SEPARATOR};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Node identity, unique for the life of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Opaque handle of a registered method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MethodId(Uuid);

impl MethodId {
    /// Returned for rejected registrations; never produced by a lookup
    pub const UNMATCHABLE: MethodId = MethodId(Uuid::nil());

    pub fn new() -> Self {
        MethodId(Uuid::new_v4())
    }

    pub fn is_unmatchable(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for MethodId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Method payload of a node
#[derive(Clone)]
pub struct Method {
    pub id: MethodId,
    pub callback: Option<Callback>,
}

impl Method {
    pub fn new(callback: Option<Callback>) -> Self {
        Self {
            id: MethodId::new(),
            callback,
        }
    }
}

impl std::fmt::Debug for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method")
            .field("id", &self.id)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Check if `name` can be used as a node name
///
/// Names must be non-empty, contain no `/`, and contain no glob syntax (they
/// must tokenize to a single literal). Strict mode also rejects space, `#`,
/// `}` and `]`.
pub fn validate_name(name: &str, strict: bool) -> bool {
    check_name(name, strict).is_ok()
}

pub(crate) fn check_name(name: &str, strict: bool) -> Result<()> {
    let reason = if name.is_empty() {
        Some("empty name")
    } else if name.contains(PATH_SEPARATOR) {
        Some("contains '/'")
    } else if tokenize(name).literal() != Some(name) {
        Some("contains pattern syntax")
    } else if strict && name.contains([' ', '#', '}', ']']) {
        Some("contains a reserved character")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(Error::InvalidName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// A node of the address tree
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    name: String,
    children: Vec<Node>,
    method: Option<Method>,
}

impl Node {
    pub(crate) fn root() -> Self {
        Self::new("")
    }

    fn new(name: &str) -> Self {
        Self {
            id: NodeId::next(),
            name: name.to_string(),
            children: Vec::new(),
            method: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn method(&self) -> Option<&Method> {
        self.method.as_ref()
    }

    pub fn method_id(&self) -> Option<MethodId> {
        self.method.as_ref().map(|m| m.id)
    }

    pub fn is_method(&self) -> bool {
        self.method.is_some()
    }

    pub fn is_container(&self) -> bool {
        !self.children.is_empty()
    }

    /// Get a direct child by exact name
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Create (or replace) the method node at `path` below this node
    ///
    /// Missing intermediate nodes are created as containers. An existing
    /// node at `path` is replaced by a fresh node (new [`NodeId`] and
    /// [`MethodId`]) when `replace_existing` is set; its children move to the
    /// replacement. Otherwise the existing method, if any, is kept.
    pub fn create_method_node(
        &mut self,
        path: &[&str],
        method: Method,
        replace_existing: bool,
        strict: bool,
    ) -> Result<MethodId> {
        let (last, parents) = path.split_last().ok_or(Error::EmptyAddress)?;
        for name in path {
            check_name(name, strict)?;
        }

        let mut node = self;
        for name in parents {
            let index = match node.children.iter().position(|c| c.name == *name) {
                Some(index) => index,
                None => {
                    node.children.push(Node::new(name));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[index];
        }

        let id = method.id;
        match node.children.iter_mut().find(|c| c.name == *last) {
            Some(existing) if replace_existing => {
                let mut fresh = Node::new(last);
                fresh.children = std::mem::take(&mut existing.children);
                fresh.method = Some(method);
                *existing = fresh;
            }
            Some(existing) => {
                if let Some(current) = existing.method_id() {
                    return Ok(current);
                }
                existing.method = Some(method);
            }
            None => {
                let mut fresh = Node::new(last);
                fresh.method = Some(method);
                node.children.push(fresh);
            }
        }

        Ok(id)
    }

    /// Detach the node at `path`
    ///
    /// Fails if any segment is missing, or if the node has children and
    /// `force` is not set.
    pub fn remove_method_node(&mut self, path: &[&str], force: bool) -> bool {
        let Some((last, parents)) = path.split_last() else {
            return false;
        };
        let Some(parent) = self.find_node_mut(parents) else {
            return false;
        };
        let Some(index) = parent.children.iter().position(|c| c.name == *last) else {
            return false;
        };

        if parent.children[index].is_container() && !force {
            return false;
        }

        parent.children.remove(index);
        true
    }

    /// Look up the node at `path` by exact names
    pub fn find_method_node(&self, path: &[&str]) -> Option<&Node> {
        if path.is_empty() {
            return None;
        }
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    pub(crate) fn find_node_mut(&mut self, path: &[&str]) -> Option<&mut Node> {
        path.iter()
            .try_fold(self, |node, name| node.children.iter_mut().find(|c| c.name == *name))
    }

    /// Every node along `path`, optionally starting with this node
    pub fn find_path_nodes(&self, path: &[&str], include_root: bool) -> Option<Vec<&Node>> {
        let mut nodes = Vec::with_capacity(path.len() + 1);
        if include_root {
            nodes.push(self);
        }

        let mut node = self;
        for name in path {
            node = node.child(name)?;
            nodes.push(node);
        }

        Some(nodes)
    }

    /// Children whose names match `component`
    pub fn find_pattern_matches(&self, component: &Component) -> Vec<&Node> {
        if let Some(name) = component.literal() {
            return self.child(name).into_iter().collect();
        }
        self.children
            .iter()
            .filter(|c| component.matches(&c.name))
            .collect()
    }

    /// Path (names below this node) of the node carrying method `id`
    pub fn path_of_method(&self, id: MethodId) -> Option<Vec<String>> {
        for child in &self.children {
            if child.method_id() == Some(id) {
                return Some(vec![child.name.clone()]);
            }
            if let Some(mut path) = child.path_of_method(id) {
                path.insert(0, child.name.clone());
                return Some(path);
            }
        }
        None
    }

    /// Number of methods below this node
    pub fn method_count(&self) -> usize {
        self.children
            .iter()
            .map(|c| usize::from(c.is_method()) + c.method_count())
            .sum()
    }

    /// Check if any node below this one carries a method
    pub fn has_methods(&self) -> bool {
        self.children.iter().any(|c| c.is_method() || c.has_methods())
    }

    pub(crate) fn take_method(&mut self) -> Option<Method> {
        self.method.take()
    }

    /// Collect `(address, method id)` for every method below this node
    pub(crate) fn collect_methods(&self, prefix: &str, out: &mut Vec<(String, MethodId)>) {
        for child in &self.children {
            let address = format!("{}{}{}", prefix, PATH_SEPARATOR, child.name);
            if let Some(id) = child.method_id() {
                out.push((address.clone(), id));
            }
            child.collect_methods(&address, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(root: &mut Node, path: &[&str]) -> MethodId {
        root.create_method_node(path, Method::new(None), true, false).unwrap()
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("freq", false));
        assert!(validate_name("a[", false));
        assert!(validate_name("with space", false));
        assert!(!validate_name("", false));
        assert!(!validate_name("a/b", false));
        assert!(!validate_name("a*", false));
        assert!(!validate_name("v?", false));
        assert!(!validate_name("[ab]", false));
        assert!(!validate_name("{x,y}", false));
        assert!(!validate_name("with space", true));
        assert!(!validate_name("a#", true));
        assert!(!validate_name("a]", true));
        assert!(!validate_name("a}", true));
        assert!(validate_name("freq", true));
    }

    #[test]
    fn test_check_name_reason() {
        assert_eq!(
            check_name("a*", false),
            Err(Error::InvalidName {
                name: "a*".to_string(),
                reason: "contains pattern syntax"
            })
        );
    }

    #[test]
    fn test_create_intermediate_containers() {
        let mut root = Node::root();
        let id = create(&mut root, &["a", "b", "m"]);

        let a = root.child("a").unwrap();
        assert!(a.is_container());
        assert!(!a.is_method());

        let m = root.find_method_node(&["a", "b", "m"]).unwrap();
        assert_eq!(m.method_id(), Some(id));
        assert_eq!(m.name(), "m");
    }

    #[test]
    fn test_replace_keeps_children() {
        let mut root = Node::root();
        create(&mut root, &["a", "b"]);
        let first = create(&mut root, &["a"]);
        let node_id = root.child("a").unwrap().id();

        let second = create(&mut root, &["a"]);
        let a = root.child("a").unwrap();

        assert_ne!(first, second);
        assert_ne!(node_id, a.id());
        assert_eq!(a.method_id(), Some(second));
        assert!(a.child("b").is_some());
    }

    #[test]
    fn test_no_replace_keeps_method() {
        let mut root = Node::root();
        let first = create(&mut root, &["x"]);
        let kept = root
            .create_method_node(&["x"], Method::new(None), false, false)
            .unwrap();
        assert_eq!(first, kept);

        create(&mut root, &["c", "leaf"]);
        let attached = root
            .create_method_node(&["c"], Method::new(None), false, false)
            .unwrap();
        assert_eq!(root.child("c").unwrap().method_id(), Some(attached));
    }

    #[test]
    fn test_create_rejects_bad_paths() {
        let mut root = Node::root();
        assert_eq!(
            root.create_method_node(&[], Method::new(None), true, false),
            Err(Error::EmptyAddress)
        );
        assert!(root
            .create_method_node(&["ok", "b*d"], Method::new(None), true, false)
            .is_err());
        // Nothing is created when a later segment is invalid
        assert!(root.child("ok").is_none());
    }

    #[test]
    fn test_remove() {
        let mut root = Node::root();
        create(&mut root, &["a", "b", "m"]);

        assert!(!root.remove_method_node(&["a", "x"], false));
        assert!(!root.remove_method_node(&["a"], false));
        assert!(root.remove_method_node(&["a", "b", "m"], false));
        assert!(root.find_method_node(&["a", "b"]).is_some());

        assert!(root.remove_method_node(&["a"], true));
        assert!(root.children().is_empty());
    }

    #[test]
    fn test_method_counts_skip_containers() {
        let mut root = Node::root();
        create(&mut root, &["a", "b", "m"]);
        create(&mut root, &["a", "n"]);
        assert_eq!(root.method_count(), 2);
        assert!(root.has_methods());

        root.remove_method_node(&["a", "b", "m"], false);
        root.remove_method_node(&["a", "n"], false);
        assert_eq!(root.method_count(), 0);
        assert!(!root.has_methods());
        assert!(root.child("a").is_some());
    }

    #[test]
    fn test_method_ids_are_fresh() {
        let first = MethodId::new();
        let second = MethodId::new();
        assert_ne!(first, second);
        assert!(!first.is_unmatchable());
        assert!(MethodId::UNMATCHABLE.is_unmatchable());
    }

    #[test]
    fn test_find_path_nodes() {
        let mut root = Node::root();
        create(&mut root, &["a", "b"]);

        let nodes = root.find_path_nodes(&["a", "b"], true).unwrap();
        let names: Vec<&str> = nodes.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["", "a", "b"]);

        assert_eq!(root.find_path_nodes(&["a", "b"], false).unwrap().len(), 2);
        assert!(root.find_path_nodes(&["a", "z"], false).is_none());
    }

    #[test]
    fn test_pattern_matches_and_identity_scan() {
        let mut root = Node::root();
        create(&mut root, &["test1", "m"]);
        let id = create(&mut root, &["test2", "m"]);
        create(&mut root, &["other"]);

        assert_eq!(root.find_pattern_matches(&tokenize("test?")).len(), 2);
        assert_eq!(root.find_pattern_matches(&tokenize("other")).len(), 1);
        assert!(root.find_pattern_matches(&tokenize("missing")).is_empty());

        assert_eq!(
            root.path_of_method(id),
            Some(vec!["test2".to_string(), "m".to_string()])
        );
        assert_eq!(root.path_of_method(MethodId::new()), None);
    }
}
