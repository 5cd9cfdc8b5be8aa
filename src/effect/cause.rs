//! Structured failure data for effects.
//!
//! A [`Cause`] is what a failed effect produces. It separates three kinds of
//! failure that callers must be able to tell apart:
//!
//! - **Expected failures** (`Fail`) - values of the effect's declared error type
//! - **Defects** (`Die`) - panics, missing services, broken wiring
//! - **Interruption** (`Interrupt`) - cooperative cancellation
//!
//! Concurrent failures are aggregated with `Parallel`.
//!
//! # Example
//!
//! ```
//! use stillwater_query::{Cause, Defect};
//!
//! let cause: Cause<&str> = Cause::both(Cause::fail("not found"), Cause::die(Defect::message("boom")));
//!
//! assert_eq!(cause.failures(), vec![&"not found"]);
//! assert!(cause.has_defect());
//! assert!(!cause.is_failure_only());
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An unanticipated failure outside of an effect's declared error type.
///
/// Defects are plain data so that a failed query can sit in the cache next
/// to successful ones.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum Defect {
    /// The effect panicked while running.
    #[error("panicked: {0}")]
    Panic(String),
    /// A service was requested that the runtime context does not provide.
    #[error("service `{0}` is not provided by the runtime context")]
    MissingService(Cow<'static, str>),
    /// No live runtime was available to run the effect.
    #[error("runtime unavailable: {0}")]
    RuntimeUnavailable(String),
    /// The runtime's layer failed while acquiring its services.
    #[error("runtime construction failed: {0}")]
    Construction(String),
    /// A lifecycle callback failed.
    #[error("{hook} callback failed: {cause}")]
    Callback {
        /// Which callback failed (`on_success`, `on_error`, ...)
        hook: Cow<'static, str>,
        /// Rendering of the callback's own cause
        cause: String,
    },
    /// The underlying transport failed.
    #[error("transport failure: {0}")]
    Transport(String),
    /// A payload or response could not be encoded or decoded.
    #[error("could not decode {what}: {message}")]
    Decode {
        /// What was being decoded
        what: String,
        /// Decoder message
        message: String,
    },
    /// Free-form defect raised with [`die`](crate::effect::die).
    #[error("{0}")]
    Message(String),
}

impl Defect {
    /// Create a free-form defect.
    pub fn message(msg: impl Into<String>) -> Self {
        Defect::Message(msg.into())
    }

    /// The service named `name` is missing.
    pub fn missing_service(name: &'static str) -> Self {
        Defect::MissingService(Cow::Borrowed(name))
    }

    /// Name of the failed callback, if this is a callback defect.
    pub fn hook(&self) -> Option<&str> {
        match self {
            Defect::Callback { hook, .. } => Some(hook),
            _ => None,
        }
    }

    /// Build a defect from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Defect::Panic(msg)
    }
}

/// Which category a cause is reported under.
///
/// Defects win over interruption, which wins over expected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CauseCategory {
    /// Only expected failures.
    Failure,
    /// At least one defect.
    Defect,
    /// Interrupted, with no defect.
    Interrupted,
}

/// The full failure of an effect run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cause<E> {
    /// An expected failure carrying the declared error type.
    Fail(E),
    /// An unexpected failure.
    Die(Defect),
    /// Cooperative cancellation.
    Interrupt,
    /// Two causes that happened concurrently.
    Parallel(Box<Cause<E>>, Box<Cause<E>>),
}

impl<E> Cause<E> {
    /// An expected failure.
    pub fn fail(error: E) -> Self {
        Cause::Fail(error)
    }

    /// A defect.
    pub fn die(defect: Defect) -> Self {
        Cause::Die(defect)
    }

    /// An interruption.
    pub fn interrupt() -> Self {
        Cause::Interrupt
    }

    /// Combine two concurrent causes.
    pub fn both(left: Cause<E>, right: Cause<E>) -> Self {
        Cause::Parallel(Box::new(left), Box::new(right))
    }

    /// All expected failures, left to right.
    pub fn failures(&self) -> Vec<&E> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Cause::Fail(e) = node {
                out.push(e);
            }
        });
        out
    }

    /// Consume the cause, keeping only its expected failures.
    pub fn into_failures(self) -> Vec<E> {
        match self {
            Cause::Fail(e) => vec![e],
            Cause::Die(_) | Cause::Interrupt => Vec::new(),
            Cause::Parallel(left, right) => {
                let mut out = left.into_failures();
                out.extend(right.into_failures());
                out
            }
        }
    }

    /// All defects, left to right.
    pub fn defects(&self) -> Vec<&Defect> {
        let mut out = Vec::new();
        self.walk(&mut |node| {
            if let Cause::Die(d) = node {
                out.push(d);
            }
        });
        out
    }

    /// Whether the cause contains a defect.
    pub fn has_defect(&self) -> bool {
        !self.defects().is_empty()
    }

    /// Whether the cause contains an interruption.
    pub fn is_interrupted(&self) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if matches!(node, Cause::Interrupt) {
                found = true;
            }
        });
        found
    }

    /// Whether the cause consists solely of expected failures.
    pub fn is_failure_only(&self) -> bool {
        !self.has_defect() && !self.is_interrupted()
    }

    /// The category this cause is reported under.
    pub fn category(&self) -> CauseCategory {
        if self.has_defect() {
            CauseCategory::Defect
        } else if self.is_interrupted() {
            CauseCategory::Interrupted
        } else {
            CauseCategory::Failure
        }
    }

    /// Unwrap a cause that is exactly one expected failure.
    ///
    /// Any other shape, including a parallel pair of expected failures, is
    /// handed back unchanged.
    pub fn into_expected(self) -> Result<E, Cause<E>> {
        match self {
            Cause::Fail(e) => Ok(e),
            other => Err(other),
        }
    }

    /// The first expected failure, or the whole cause if it has none.
    pub fn failure_or_cause(self) -> Result<E, Cause<E>> {
        match self {
            Cause::Fail(e) => Ok(e),
            Cause::Parallel(left, right) => match left.failure_or_cause() {
                Ok(e) => Ok(e),
                Err(left) => right
                    .failure_or_cause()
                    .map_err(|right| Cause::both(left, right)),
            },
            other => Err(other),
        }
    }

    /// Drop expected failures, retyping what remains.
    ///
    /// Returns `None` when nothing but expected failures was present.
    pub(crate) fn without_failures<E2>(self) -> Option<Cause<E2>> {
        match self {
            Cause::Fail(_) => None,
            Cause::Die(d) => Some(Cause::Die(d)),
            Cause::Interrupt => Some(Cause::Interrupt),
            Cause::Parallel(left, right) => {
                match (left.without_failures(), right.without_failures()) {
                    (Some(l), Some(r)) => Some(Cause::both(l, r)),
                    (Some(c), None) | (None, Some(c)) => Some(c),
                    (None, None) => None,
                }
            }
        }
    }

    /// Transform every expected failure in the cause.
    pub fn map<E2, F>(self, mut f: F) -> Cause<E2>
    where
        F: FnMut(E) -> E2,
    {
        self.map_inner(&mut f)
    }

    fn map_inner<E2, F>(self, f: &mut F) -> Cause<E2>
    where
        F: FnMut(E) -> E2,
    {
        match self {
            Cause::Fail(e) => Cause::Fail(f(e)),
            Cause::Die(d) => Cause::Die(d),
            Cause::Interrupt => Cause::Interrupt,
            Cause::Parallel(left, right) => {
                let left = left.map_inner(f);
                let right = right.map_inner(f);
                Cause::Parallel(Box::new(left), Box::new(right))
            }
        }
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Cause<E>)) {
        match self {
            Cause::Parallel(left, right) => {
                left.walk(visit);
                right.walk(visit);
            }
            node => visit(node),
        }
    }
}

impl<E: fmt::Debug> Cause<E> {
    /// Collapse the cause into a defect, e.g. when a callback fails.
    pub fn into_defect(self, hook: &'static str) -> Defect {
        Defect::Callback {
            hook: Cow::Borrowed(hook),
            cause: format!("{:?}", self),
        }
    }
}

impl<E: fmt::Display> fmt::Display for Cause<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::Fail(e) => write!(f, "{}", e),
            Cause::Die(d) => write!(f, "defect: {}", d),
            Cause::Interrupt => write!(f, "interrupted"),
            Cause::Parallel(left, right) => write!(f, "({}) | ({})", left, right),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for Cause<E> {}

impl<E> From<Defect> for Cause<E> {
    fn from(defect: Defect) -> Self {
        Cause::Die(defect)
    }
}
