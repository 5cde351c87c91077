//! Cancellation and deadline management.
//!
//! Long-running traversals (cycle search over dense trade graphs in particular)
//! poll a [`CancellationToken`] between expansions. A token is cancelled
//! explicitly or implicitly once an attached deadline has passed.
//!
//! # Example
//!
//! ```rust
//! use graphrisk_core::cancel::{CancellationToken, DeadlineContext};
//! use std::time::Duration;
//!
//! let deadline = DeadlineContext::new(Duration::from_secs(30));
//! let token = deadline.token();
//! assert!(!token.is_cancelled());
//! token.cancel();
//! assert!(token.is_cancelled());
//! ```

use crate::error::{AnalysisError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cloneable cancellation flag shared between a caller and a running analysis.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    /// Create a token that is only cancelled explicitly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a token that also trips once `timeout` has elapsed.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Request cancellation. Every clone observes it.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true once cancelled or past the deadline.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Acquire) {
            return true;
        }
        matches!(self.deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Return `Err(Cancelled)` when the token has tripped.
    pub fn check(&self, what: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled(what.to_string()))
        } else {
            Ok(())
        }
    }

    /// Derive a token sharing this flag but bounded by an earlier deadline.
    #[must_use]
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) => existing.min(candidate),
            None => candidate,
        };
        Self {
            flag: Arc::clone(&self.flag),
            deadline: Some(deadline),
        }
    }
}

/// Deadline context for a whole analysis run.
#[derive(Debug, Clone)]
pub struct DeadlineContext {
    deadline: Instant,
    original_timeout: Duration,
    created_at: Instant,
    token: CancellationToken,
}

impl DeadlineContext {
    /// Create a new deadline context
    pub fn new(timeout: Duration) -> Self {
        let now = Instant::now();
        Self {
            deadline: now + timeout,
            original_timeout: timeout,
            created_at: now,
            token: CancellationToken {
                flag: Arc::new(AtomicBool::new(false)),
                deadline: Some(now + timeout),
            },
        }
    }

    /// Get remaining time until deadline
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Check if deadline has passed
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Get the original timeout
    pub fn original_timeout(&self) -> Duration {
        self.original_timeout
    }

    /// Get elapsed time since context creation
    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Token bound to this deadline.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Run a future, failing with `Timeout` when the deadline passes first.
    ///
    /// The shared token is cancelled on timeout so blocking work polling it
    /// stops as well.
    pub async fn execute<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.remaining(), fut).await {
            Ok(result) => result,
            Err(_elapsed) => {
                self.token.cancel();
                Err(AnalysisError::Timeout(self.original_timeout))
            }
        }
    }
}
