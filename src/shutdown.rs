//! Cooperative shutdown.
//!
//! A [`ShutdownToken`] is a flag plus a list of wakers. Blocking waits that
//! cannot observe the flag on their own (the transport receive sleeps in a
//! futex) register a waker, and [`ShutdownToken::request`] runs every waker
//! after raising the flag so those waits return promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

type Waker = Box<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Inner {
    requested: AtomicBool,
    wakers: Mutex<Vec<Waker>>,
}

#[derive(Clone, Default)]
pub struct ShutdownToken {
    inner: Arc<Inner>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the flag and wake every registered waiter. Safe to call repeatedly
    /// and from a signal-handling thread.
    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        for wake in self.inner.wakers.lock().iter() {
            wake();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Run `wake` on every future [`request`](Self::request). If shutdown was
    /// already requested it runs once immediately.
    pub fn register_waker<F>(&self, wake: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut wakers = self.inner.wakers.lock();
        if self.is_requested() {
            wake();
        }
        wakers.push(Box::new(wake));
    }
}

impl std::fmt::Debug for ShutdownToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownToken")
            .field("requested", &self.is_requested())
            .field("wakers", &self.inner.wakers.lock().len())
            .finish()
    }
}
