//! Process-wide stop request shared by the monitor, dispatcher and sessions.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Clonable one-way latch. Once triggered it stays triggered.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    triggered: Mutex<bool>,
    cond: Condvar,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter.
    pub fn trigger(&self) {
        let mut triggered = self.inner.triggered.lock();
        if !*triggered {
            tracing::info!("shutdown requested");
        }
        *triggered = true;
        self.inner.cond.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.triggered.lock()
    }

    /// Block up to `timeout` for a trigger. Returns whether it is triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut triggered = self.inner.triggered.lock();
        if !*triggered {
            self.inner.cond.wait_for(&mut triggered, timeout);
        }
        *triggered
    }

    /// Block until triggered.
    pub fn wait(&self) {
        let mut triggered = self.inner.triggered.lock();
        while !*triggered {
            self.inner.cond.wait(&mut triggered);
        }
    }
}
