//! Escalation of failures that no caller is waiting for.
//!
//! A query whose `throw_on_error` predicate matches, or a mutation callback
//! that fails, has nobody to return its error to. It is thrown to the
//! nearest [`ErrorBoundary`] instead. Without a boundary the failure is
//! logged at `error` level, never dropped.

use leptos_reactive::{provide_context, use_context, RwSignal, SignalGet, SignalSet};

/// A failure escalated out of a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrownError {
    /// What threw: a query key or a mutation callback name.
    pub origin: String,
    /// Rendering of the escalated error.
    pub message: String,
}

impl ThrownError {
    /// An error thrown by `origin`.
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        ThrownError {
            origin: origin.into(),
            message: message.into(),
        }
    }
}

/// Catches errors thrown by the hooks below it.
///
/// Keeps the most recent error until [`reset`](Self::reset).
#[derive(Debug, Clone, Copy)]
pub struct ErrorBoundary {
    caught: RwSignal<Option<ThrownError>>,
}

impl ErrorBoundary {
    /// Install a boundary for the current owner and everything below it.
    pub fn provide() -> Self {
        let boundary = ErrorBoundary {
            caught: RwSignal::new(None),
        };
        provide_context(boundary);
        boundary
    }

    /// The nearest boundary above the current owner.
    pub fn current() -> Option<Self> {
        use_context::<ErrorBoundary>()
    }

    /// The last caught error, tracked.
    pub fn error(&self) -> Option<ThrownError> {
        self.caught.try_get().flatten()
    }

    /// Forget the caught error.
    pub fn reset(&self) {
        let _ = self.caught.try_set(None);
    }

    /// Hands the error back if the boundary's owner is gone.
    fn catch(&self, error: ThrownError) -> Option<ThrownError> {
        self.caught.try_set(Some(error)).flatten()
    }
}

/// Throw `error` to the nearest boundary of the current owner.
pub fn throw_error(error: ThrownError) {
    escalate(ErrorBoundary::current(), error);
}

/// Throw `error` to `boundary`, captured earlier by a hook that runs its
/// work outside of any owner.
pub(crate) fn escalate(boundary: Option<ErrorBoundary>, error: ThrownError) {
    let uncaught = match boundary {
        Some(boundary) => boundary.catch(error),
        None => Some(error),
    };
    if let Some(error) = uncaught {
        tracing::error!(
            origin = %error.origin,
            error = %error.message,
            "uncaught error, no error boundary in scope"
        );
    }
}
