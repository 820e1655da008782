//! Single-slot spy registry.

use super::Spy;
use crate::error::ProxyError;
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// Holds at most one attached spy.
///
/// The lock is only held for the pointer read or write, never while a
/// spy handler runs.
#[derive(Default)]
pub struct SpySlot {
    spy: Mutex<Option<Arc<dyn Spy>>>,
}

impl SpySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `spy`, failing if another spy is already attached.
    ///
    /// The spy stays attached until the returned guard is dropped.
    pub fn attach<S: Spy + 'static>(self: &Arc<Self>, spy: S) -> Result<SpyGuard<S>, ProxyError> {
        let spy = Arc::new(spy);
        {
            let mut slot = self.spy.lock();
            if slot.is_some() {
                return Err(ProxyError::AlreadyAttached);
            }
            *slot = Some(Arc::clone(&spy) as Arc<dyn Spy>);
        }
        debug!("Spy attached");

        Ok(SpyGuard {
            slot: Arc::clone(self),
            spy,
        })
    }

    /// Snapshot of the attached spy, if any.
    ///
    /// The spy may be detached right after this returns; callers keep using
    /// the snapshot for the rest of the request.
    pub fn current(&self) -> Option<Arc<dyn Spy>> {
        self.spy.lock().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.spy.lock().is_some()
    }

    fn detach(&self) {
        self.spy.lock().take();
        debug!("Spy detached");
    }
}

/// Scope handle for an attached spy. Dropping it detaches the spy.
pub struct SpyGuard<S: Spy + 'static> {
    slot: Arc<SpySlot>,
    spy: Arc<S>,
}

impl<S: Spy + 'static> SpyGuard<S> {
    /// Shared handle to the spy, usable after the guard is gone.
    pub fn spy(&self) -> Arc<S> {
        Arc::clone(&self.spy)
    }

    /// Detach the spy now rather than at end of scope.
    pub fn detach(self) {
        drop(self);
    }
}

impl<S: Spy + 'static> Deref for SpyGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.spy
    }
}

impl<S: Spy + 'static> Drop for SpyGuard<S> {
    fn drop(&mut self) {
        self.slot.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    #[derive(Default)]
    struct CountingSpy {
        calls: AtomicUsize,
    }

    impl Spy for CountingSpy {
        fn post_graphql(&self, _body: &[u8]) -> anyhow::Result<Option<crate::spy::SpyResponse>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[test]
    fn test_slot_starts_empty() {
        let slot = SpySlot::new();
        assert!(!slot.is_attached());
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_attach_then_attach_conflicts() {
        let slot = Arc::new(SpySlot::new());
        let _guard = slot.attach(CountingSpy::default()).unwrap();

        let second = slot.attach(CountingSpy::default());
        assert!(matches!(second, Err(ProxyError::AlreadyAttached)));
        assert!(slot.is_attached());
    }

    #[test]
    fn test_attach_detach_attach() {
        let slot = Arc::new(SpySlot::new());

        let guard = slot.attach(CountingSpy::default()).unwrap();
        guard.detach();
        assert!(!slot.is_attached());

        let _guard = slot.attach(CountingSpy::default()).unwrap();
        assert!(slot.is_attached());
    }

    #[test]
    fn test_current_returns_attached_spy() {
        let slot = Arc::new(SpySlot::new());
        let guard = slot.attach(CountingSpy::default()).unwrap();

        let current = slot.current().unwrap();
        current.post_graphql(b"{}").unwrap();
        current.post_graphql(b"{}").unwrap();

        assert_eq!(guard.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_snapshot_survives_detach() {
        let slot = Arc::new(SpySlot::new());
        let guard = slot.attach(CountingSpy::default()).unwrap();
        let spy = guard.spy();

        let snapshot = slot.current().unwrap();
        drop(guard);

        assert!(slot.current().is_none());
        snapshot.post_graphql(b"late").unwrap();
        assert_eq!(spy.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_detaches_on_panic() {
        let slot = Arc::new(SpySlot::new());

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = slot.attach(CountingSpy::default()).unwrap();
            panic!("assertion failed inside the spy scope");
        }));

        assert!(result.is_err());
        assert!(!slot.is_attached());
        assert!(slot.attach(CountingSpy::default()).is_ok());
    }

    #[test]
    fn test_concurrent_attach_admits_exactly_one() {
        let slot = Arc::new(SpySlot::new());
        let threads = 8;
        let barrier = Arc::new(Barrier::new(threads));

        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let slot = Arc::clone(&slot);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    slot.attach(CountingSpy::default())
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let attached = results.iter().filter(|r| r.is_ok()).count();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(ProxyError::AlreadyAttached)))
            .count();

        assert_eq!(attached, 1);
        assert_eq!(conflicts, threads - 1);

        drop(results);
        assert!(!slot.is_attached());
    }
}
