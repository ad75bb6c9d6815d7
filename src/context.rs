//! Deadlines and cancellation for lifecycle calls.
//!
//! A [`Context`] is handed to `start` and `shutdown` so the caller can bound
//! how long the extension may take. It finishes either when its deadline
//! passes or when the paired [`CancelHandle`] is triggered.

use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The context was canceled through its [`CancelHandle`].
    #[error("context canceled")]
    Canceled,
    /// The context deadline passed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

/// Deadline and cancellation scope for a single lifecycle call.
#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

/// Cancels the [`Context`] it was created with.
///
/// Dropping the handle without calling [`CancelHandle::cancel`] leaves the
/// context running.
#[derive(Debug)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    /// Cancels the paired context.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Context {
    /// A context that never finishes.
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that finishes after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that finishes at `deadline`.
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            cancel: None,
        }
    }

    /// A context that finishes when the returned handle is canceled.
    #[must_use]
    pub fn with_cancel() -> (Self, CancelHandle) {
        let token = CancellationToken::new();
        let ctx = Self {
            deadline: None,
            cancel: Some(token.clone()),
        };
        (ctx, CancelHandle { token })
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context finished, or `None` while it is still live.
    #[must_use]
    pub fn err(&self) -> Option<ContextError> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Some(ContextError::Canceled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some(ContextError::DeadlineExceeded);
        }
        None
    }

    /// Resolves once the context has finished.
    pub async fn done(&self) -> ContextError {
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        let canceled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = canceled => ContextError::Canceled,
            () = deadline => ContextError::DeadlineExceeded,
        }
    }
}
