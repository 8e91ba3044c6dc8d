//! Cold-start and system readiness gates.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

/// Two one-way gates shared by the loader, the flush loops and the
/// event-dispatch layer.
///
/// `cache_loaded` flips once every family finished its initial load.
/// `ready` flips once the surrounding system (gateway connection) is up;
/// flush loops do not start ticking before it. Neither ever flips back.
#[derive(Debug)]
pub struct Readiness {
    cache_loaded: AtomicBool,
    ready: watch::Sender<bool>,
}

impl Readiness {
    pub fn new() -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            cache_loaded: AtomicBool::new(false),
            ready,
        }
    }

    /// Whether reads of cached families are allowed.
    pub fn is_cache_loaded(&self) -> bool {
        self.cache_loaded.load(Ordering::Acquire)
    }

    /// Open the cache gate. Returns `false` if it was already open.
    pub fn mark_cache_loaded(&self) -> bool {
        !self.cache_loaded.swap(true, Ordering::AcqRel)
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Signal that the system is up.
    pub fn mark_ready(&self) {
        self.ready.send_replace(true);
    }

    /// Wait until [`mark_ready`](Self::mark_ready) was called.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.ready.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for Readiness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_cache_gate_flips_once() {
        let readiness = Readiness::new();
        assert!(!readiness.is_cache_loaded());
        assert!(readiness.mark_cache_loaded());
        assert!(!readiness.mark_cache_loaded());
        assert!(readiness.is_cache_loaded());
    }

    #[tokio::test]
    async fn test_wait_until_ready() {
        let readiness = Arc::new(Readiness::new());
        let waiter = {
            let readiness = Arc::clone(&readiness);
            tokio::spawn(async move { readiness.wait_until_ready().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        readiness.mark_ready();
        waiter.await.unwrap();
        assert!(readiness.is_ready());

        // Already ready: returns immediately.
        readiness.wait_until_ready().await;
    }
}
