//! Cancellation and deadline propagation for blocking operations.
//!
//! Store and evaluator calls may block on I/O; each takes a `CancelToken` and
//! must abort promptly once the token trips. Graph traversal and projection
//! are CPU-only and do not take tokens.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{AccessGraphError, AgResult};

#[derive(Debug)]
struct Inner {
    canceled: AtomicBool,
    deadline: Option<Instant>,
}

/// A cloneable cancel flag with an optional deadline. Cloning shares the
/// underlying flag: canceling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// A token that never expires on its own.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                canceled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// A token that trips automatically once `timeout` elapses.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                canceled: AtomicBool::new(false),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    /// Trips the token. Idempotent.
    pub fn cancel(&self) {
        self.inner.canceled.store(true, Ordering::Release);
    }

    pub fn is_canceled(&self) -> bool {
        if self.inner.canceled.load(Ordering::Acquire) {
            return true;
        }
        matches!(self.inner.deadline, Some(d) if Instant::now() >= d)
    }

    /// Returns `Err(Canceled)` if the token has tripped or its deadline has
    /// passed. Call this at operation entry and between row batches.
    pub fn check(&self) -> AgResult<()> {
        if self.is_canceled() {
            Err(AccessGraphError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Time left until the deadline, if one was set. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
