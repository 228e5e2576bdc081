//! Thread-safe address space handle
//!
//! Registration usually happens on a control path while messages are
//! dispatched from a network receive loop on another thread. The handle
//! serializes writers against readers with a read/write lock and never holds
//! the lock while a callback runs, so callbacks may register or unregister
//! methods themselves.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use rosc::{OscMessage, OscPacket};

use crate::config::AddressSpaceConfig;
use crate::node::MethodId;
use crate::space::{flatten_packet, invoke, AddressSpace, Callback, DispatchContext, MethodCall};
use crate::Result;

/// Cloneable, lock-protected [`AddressSpace`]
#[derive(Debug, Clone, Default)]
pub struct SharedAddressSpace {
    inner: Arc<RwLock<AddressSpace>>,
}

impl SharedAddressSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AddressSpaceConfig) -> Self {
        AddressSpace::with_config(config).into()
    }

    /// Read access for introspection; do not hold across dispatch
    pub fn read(&self) -> RwLockReadGuard<'_, AddressSpace> {
        self.inner.read()
    }

    pub fn register(&self, address: &str, callback: Option<Callback>) -> MethodId {
        self.inner.write().register(address, callback)
    }

    pub fn try_register(&self, address: &str, callback: Option<Callback>) -> Result<MethodId> {
        self.inner.write().try_register(address, callback)
    }

    pub fn register_fn<F>(&self, address: &str, f: F) -> MethodId
    where
        F: Fn(&MethodCall<'_>) + Send + Sync + 'static,
    {
        self.inner.write().register_fn(address, f)
    }

    pub fn unregister(&self, address: &str) -> bool {
        self.inner.write().unregister(address)
    }

    pub fn unregister_method(&self, id: MethodId) -> bool {
        self.inner.write().unregister_method(id)
    }

    pub fn unregister_and_prune(&self, address: &str) -> bool {
        self.inner.write().unregister_and_prune(address)
    }

    pub fn unregister_all(&self) {
        self.inner.write().unregister_all();
    }

    pub fn methods(&self, pattern: &str) -> Vec<MethodId> {
        self.inner.read().methods(pattern)
    }

    pub fn try_methods(&self, pattern: &str) -> Result<Vec<MethodId>> {
        self.inner.read().try_methods(pattern)
    }

    /// Resolve under the read lock, then invoke callbacks with it released
    pub fn dispatch(&self, message: &OscMessage, context: &DispatchContext) -> Vec<MethodId> {
        let targets = self.inner.read().targets(&message.addr);
        invoke(&targets, message, context);
        targets.into_iter().map(|(id, _)| id).collect()
    }

    pub fn dispatch_packet(&self, packet: &OscPacket, context: &DispatchContext) -> Vec<MethodId> {
        flatten_packet(packet)
            .into_iter()
            .flat_map(|message| self.dispatch(message, context))
            .collect()
    }

    /// Resolve synchronously, then run each callback as its own tokio task
    ///
    /// Tasks are fire-and-forget with no ordering between them. Without a
    /// current runtime the callbacks run inline.
    #[cfg(feature = "runtime")]
    pub fn dispatch_spawned(&self, message: OscMessage, context: DispatchContext) -> Vec<MethodId> {
        let targets = self.inner.read().targets(&message.addr);
        let ids = targets.iter().map(|(id, _)| *id).collect();

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime, dispatching {} inline", message.addr);
            invoke(&targets, &message, &context);
            return ids;
        };

        let message = Arc::new(message);
        let context = Arc::new(context);
        for (id, callback) in targets {
            let Some(callback) = callback else {
                continue;
            };
            let message = Arc::clone(&message);
            let context = Arc::clone(&context);
            handle.spawn(async move {
                callback(&MethodCall {
                    method: id,
                    message: &message,
                    context: &context,
                });
            });
        }

        ids
    }
}

impl From<AddressSpace> for SharedAddressSpace {
    fn from(space: AddressSpace) -> Self {
        Self {
            inner: Arc::new(RwLock::new(space)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn message(addr: &str) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args: vec![],
        }
    }

    #[test]
    fn test_callback_can_register() {
        let space = SharedAddressSpace::new();
        let inner = space.clone();

        space.register_fn("/spawn", move |_| {
            inner.register("/spawned", None);
        });

        let ids = space.dispatch(&message("/spawn"), &DispatchContext::default());
        assert_eq!(ids.len(), 1);
        assert_eq!(space.methods("/spawned").len(), 1);
    }

    #[test]
    fn test_concurrent_dispatch() {
        let space = SharedAddressSpace::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        space.register_fn("/synth/freq", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let threads: Vec<_> = (0..4)
            .map(|i| {
                let space = space.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        space.dispatch(&message("/synth/*"), &DispatchContext::default());
                    }
                    space.register(&format!("/extra/{}", i), None);
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 100);
        assert_eq!(space.methods("/extra/*").len(), 4);
    }

    #[cfg(feature = "runtime")]
    #[test]
    fn test_spawned_without_runtime_runs_inline() {
        let space = SharedAddressSpace::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        space.register_fn("/a", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let ids = space.dispatch_spawned(message("/a"), DispatchContext::default());
        assert_eq!(ids.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
