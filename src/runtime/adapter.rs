//! Promise-style entry points for running effects.
//!
//! These adapters are the boundary between effects and ordinary async code,
//! such as a query function. They run an effect on a [`Runtime`], optionally
//! tied to a cancellation signal, and present the outcome in one of three
//! shapes:
//!
//! | Function | Outcome |
//! |----------|---------|
//! | [`run_promise`] | `Result<T, Cause<E>>` |
//! | [`run_promise_exit`] | [`Exit<T, E>`], never an error |
//! | [`run_promise_unwrapped`] | `Result<T, QueryError<E>>` |

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::effect::cause::Cause;
use crate::effect::exit::Exit;
use crate::effect::trait_def::Effect;
use crate::runtime::Runtime;

/// Options for a single effect run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    signal: Option<CancellationToken>,
}

impl RunOptions {
    /// Options with no cancellation signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interrupt the run when `signal` is cancelled.
    pub fn with_signal(signal: CancellationToken) -> Self {
        RunOptions {
            signal: Some(signal),
        }
    }

    /// The cancellation signal, if any.
    pub fn signal(&self) -> Option<&CancellationToken> {
        self.signal.as_ref()
    }
}

/// Run an effect; fail with its full cause.
///
/// When the signal fires first, the run is interrupted: finalizers complete
/// and the result is [`Cause::Interrupt`].
pub async fn run_promise<Eff>(
    runtime: &Runtime,
    effect: Eff,
    options: RunOptions,
) -> Result<Eff::Output, Cause<Eff::Error>>
where
    Eff: Effect<Env = Context>,
{
    runtime.execute(effect, options.signal()).await
}

/// Run an effect and capture its outcome.
pub async fn run_promise_exit<Eff>(
    runtime: &Runtime,
    effect: Eff,
    options: RunOptions,
) -> Exit<Eff::Output, Eff::Error>
where
    Eff: Effect<Env = Context>,
{
    runtime.execute(effect, options.signal()).await.into()
}

/// Run an effect for a query or mutation.
///
/// With `throw_on_defect`, a cause that is exactly one expected failure is
/// unwrapped to [`QueryError::Failure`]. Anything else (defects,
/// interruption, concurrent failures) stays a [`QueryError::Cause`].
pub async fn run_promise_unwrapped<Eff>(
    runtime: &Runtime,
    effect: Eff,
    options: RunOptions,
    throw_on_defect: bool,
) -> Result<Eff::Output, QueryError<Eff::Error>>
where
    Eff: Effect<Env = Context>,
{
    runtime
        .execute(effect, options.signal())
        .await
        .map_err(|cause| QueryError::from_cause(cause, throw_on_defect))
}

/// The error a query or mutation observes.
///
/// Cached next to query data, so it serializes whenever `E` does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryError<E> {
    /// A single expected failure, unwrapped.
    Failure(E),
    /// The full cause of the failed run.
    Cause(Cause<E>),
}

impl<E> QueryError<E> {
    /// Translate a cause, unwrapping a lone expected failure when
    /// `throw_on_defect` is set.
    pub fn from_cause(cause: Cause<E>, throw_on_defect: bool) -> Self {
        if !throw_on_defect {
            return QueryError::Cause(cause);
        }
        match cause.into_expected() {
            Ok(error) => QueryError::Failure(error),
            Err(cause) => QueryError::Cause(cause),
        }
    }

    /// The unwrapped expected failure, if this is one.
    pub fn failure(&self) -> Option<&E> {
        match self {
            QueryError::Failure(error) => Some(error),
            QueryError::Cause(_) => None,
        }
    }

    /// The cause, if this error was not unwrapped.
    pub fn cause(&self) -> Option<&Cause<E>> {
        match self {
            QueryError::Failure(_) => None,
            QueryError::Cause(cause) => Some(cause),
        }
    }

    /// Every expected failure this error carries.
    pub fn failures(&self) -> Vec<&E> {
        match self {
            QueryError::Failure(error) => vec![error],
            QueryError::Cause(cause) => cause.failures(),
        }
    }

    /// Whether the run died with a defect.
    pub fn is_defect(&self) -> bool {
        matches!(self, QueryError::Cause(cause) if cause.has_defect())
    }

    /// Whether the run was interrupted.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, QueryError::Cause(cause) if cause.is_interrupted())
    }

    /// Turn back into a cause.
    pub fn into_cause(self) -> Cause<E> {
        match self {
            QueryError::Failure(error) => Cause::Fail(error),
            QueryError::Cause(cause) => cause,
        }
    }

    /// Transform the expected failure type.
    pub fn map<E2>(self, mut f: impl FnMut(E) -> E2) -> QueryError<E2> {
        match self {
            QueryError::Failure(error) => QueryError::Failure(f(error)),
            QueryError::Cause(cause) => QueryError::Cause(cause.map(f)),
        }
    }
}

impl<E> From<Cause<E>> for QueryError<E> {
    fn from(cause: Cause<E>) -> Self {
        QueryError::Cause(cause)
    }
}

impl<E: fmt::Display> fmt::Display for QueryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Failure(error) => write!(f, "{}", error),
            QueryError::Cause(cause) => write!(f, "{}", cause),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for QueryError<E> {}
