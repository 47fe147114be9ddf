//! State shared between the face monitor and the dispatcher.
//!
//! The registry, the pending new-face latch, the conversation-active flag
//! and the display counters sit behind one lock. Checking the flag before
//! raising the latch, and clearing the latch while setting the flag, are
//! therefore each a single critical section.

use greeter_core::{Embedding, FaceRegistry, Registration, ShutdownSignal};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::time::Duration;

struct Shared {
    registry: FaceRegistry,
    unique_faces: u64,
    /// New-face latch: set by the monitor, taken by the dispatcher.
    face_pending: bool,
    conversation_active: bool,
}

/// Consistent view of the display counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub unique_faces: u64,
    pub conversation_active: bool,
}

/// What the monitor learns from registering one face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceOutcome {
    pub registration: Registration,
    /// Unique-individual count after this face (equals the crop index when new).
    pub unique_faces: u64,
    /// Whether this face raised the new-face latch.
    pub signalled: bool,
}

/// Result of one bounded dispatcher wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// A new face was pending; the latch is cleared and the conversation flag set.
    NewFace,
    TimedOut,
    Shutdown,
}

pub struct CoordinationContext {
    shared: Mutex<Shared>,
    wake: Condvar,
    shutdown: ShutdownSignal,
}

impl CoordinationContext {
    pub fn new(registry: FaceRegistry, shutdown: ShutdownSignal) -> Self {
        Self {
            shared: Mutex::new(Shared {
                registry,
                unique_faces: 0,
                face_pending: false,
                conversation_active: false,
            }),
            wake: Condvar::new(),
            shutdown,
        }
    }

    pub fn shutdown(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Trigger shutdown and wake the dispatcher if it is waiting.
    pub fn request_shutdown(&self) {
        self.shutdown.trigger();
        let _guard = self.shared.lock();
        self.wake.notify_all();
    }

    /// Deduplicate `embedding`; on a new individual, bump the count and raise
    /// the latch unless a conversation is already running.
    pub fn register_face(&self, embedding: &Embedding) -> FaceOutcome {
        let mut shared = self.shared.lock();
        let registration = shared.registry.check_and_register(embedding);

        let mut signalled = false;
        if registration.is_new {
            shared.unique_faces += 1;
            if !shared.conversation_active {
                shared.face_pending = true;
                signalled = true;
                self.wake.notify_one();
            }
        }

        FaceOutcome {
            registration,
            unique_faces: shared.unique_faces,
            signalled,
        }
    }

    /// Wait up to `timeout` for a pending face.
    ///
    /// On [`Wake::NewFace`] the caller owns the conversation and must call
    /// [`finish_conversation`](Self::finish_conversation) when it ends.
    pub fn wait_for_new_face(&self, timeout: Duration) -> Wake {
        let mut shared = self.shared.lock();
        if !self.shutdown.is_triggered() && !(shared.face_pending && !shared.conversation_active) {
            self.wake.wait_for(&mut shared, timeout);
        }

        if self.shutdown.is_triggered() {
            return Wake::Shutdown;
        }
        if shared.face_pending && !shared.conversation_active {
            shared.face_pending = false;
            shared.conversation_active = true;
            return Wake::NewFace;
        }
        Wake::TimedOut
    }

    /// Clear the conversation flag.
    pub fn finish_conversation(&self) {
        let mut shared = self.shared.lock();
        shared.conversation_active = false;
    }

    pub fn is_conversation_active(&self) -> bool {
        self.shared.lock().conversation_active
    }

    #[cfg(test)]
    pub fn is_face_pending(&self) -> bool {
        self.shared.lock().face_pending
    }

    pub fn registry_len(&self) -> usize {
        self.shared.lock().registry.individuals()
    }

    pub fn snapshot(&self) -> Snapshot {
        let shared = self.shared.lock();
        Snapshot {
            unique_faces: shared.unique_faces,
            conversation_active: shared.conversation_active,
        }
    }
}
