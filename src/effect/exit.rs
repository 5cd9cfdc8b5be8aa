//! Terminal outcome of running an effect.

use crate::effect::cause::Cause;

/// The outcome of an effect run: a success value or the failure [`Cause`].
///
/// `Exit` is plain data. Obtaining one never triggers further work, so it is
/// safe to inspect, clone, and pattern-match freely.
///
/// # Example
///
/// ```
/// use stillwater_query::{Cause, Exit};
///
/// let exit: Exit<i32, &str> = Exit::Failure(Cause::fail("nope"));
/// match exit {
///     Exit::Success(v) => println!("got {}", v),
///     Exit::Failure(cause) => assert_eq!(cause.failures(), vec![&"nope"]),
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Exit<T, E> {
    /// The effect succeeded.
    Success(T),
    /// The effect failed, died, or was interrupted.
    Failure(Cause<E>),
}

impl<T, E> Exit<T, E> {
    /// Whether this is a success.
    pub fn is_success(&self) -> bool {
        matches!(self, Exit::Success(_))
    }

    /// Whether this is a failure of any kind.
    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Whether the run was interrupted.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Exit::Failure(cause) if cause.is_interrupted())
    }

    /// The success value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Exit::Success(v) => Some(v),
            Exit::Failure(_) => None,
        }
    }

    /// The failure cause, if any.
    pub fn cause(&self) -> Option<&Cause<E>> {
        match self {
            Exit::Success(_) => None,
            Exit::Failure(c) => Some(c),
        }
    }

    /// Transform the success value.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Exit<U, E> {
        match self {
            Exit::Success(v) => Exit::Success(f(v)),
            Exit::Failure(c) => Exit::Failure(c),
        }
    }

    /// Convert into a `Result`.
    pub fn into_result(self) -> Result<T, Cause<E>> {
        self.into()
    }
}

impl<T, E> From<Result<T, Cause<E>>> for Exit<T, E> {
    fn from(result: Result<T, Cause<E>>) -> Self {
        match result {
            Ok(v) => Exit::Success(v),
            Err(c) => Exit::Failure(c),
        }
    }
}

impl<T, E> From<Exit<T, E>> for Result<T, Cause<E>> {
    fn from(exit: Exit<T, E>) -> Self {
        match exit {
            Exit::Success(v) => Ok(v),
            Exit::Failure(c) => Err(c),
        }
    }
}
