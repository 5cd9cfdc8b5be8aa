//! Constructor functions for creating effects.
//!
//! These functions provide ergonomic ways to create effects without
//! directly constructing the combinator types.

use std::future::Future;

use crate::effect::cause::Defect;
use crate::effect::combinators::{Die, Fail, FromAsync, FromFn, FromResult, Pure};
use crate::effect::reader::{Asks, Local};
use crate::effect::trait_def::Effect;

/// Create a pure effect that succeeds with the given value.
///
/// # Example
///
/// ```rust,ignore
/// let effect = pure::<_, String, ()>(42);
/// assert_eq!(effect.execute(&()).await, Ok(42));
/// ```
pub fn pure<T, E, Env>(value: T) -> Pure<T, E, Env>
where
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    Pure::new(value)
}

/// Create an effect that fails with an expected error.
///
/// # Example
///
/// ```rust,ignore
/// let effect = fail::<i32, _, ()>("UserNotFound");
/// assert_eq!(effect.execute(&()).await, Err(Cause::Fail("UserNotFound")));
/// ```
pub fn fail<T, E, Env>(error: E) -> Fail<T, E, Env>
where
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    Fail::new(error)
}

/// Create an effect that fails with a defect.
///
/// Use this for broken invariants, not for business conditions.
pub fn die<T, E, Env>(defect: Defect) -> Die<T, E, Env>
where
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    Die::new(defect)
}

/// Create an effect from a synchronous function.
///
/// The function receives a reference to the environment and returns a `Result`.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone)]
/// struct Env { value: i32 }
///
/// let effect = from_fn(|env: &Env| Ok::<_, String>(env.value * 2));
/// assert_eq!(effect.execute(&Env { value: 21 }).await, Ok(42));
/// ```
pub fn from_fn<T, E, Env, F>(f: F) -> FromFn<F, Env>
where
    F: FnOnce(&Env) -> Result<T, E> + Send,
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    FromFn::new(f)
}

/// Create an effect from an async function.
///
/// # Example
///
/// ```rust,ignore
/// let effect = from_async(|_: &()| async { Ok::<_, String>(42) });
/// assert_eq!(effect.execute(&()).await, Ok(42));
/// ```
pub fn from_async<T, E, Env, F, Fut>(f: F) -> FromAsync<F, Env>
where
    F: FnOnce(&Env) -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    FromAsync::new(f)
}

/// Create an effect from a Result.
pub fn from_result<T, E, Env>(result: Result<T, E>) -> FromResult<T, E, Env>
where
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    FromResult::new(result)
}

/// Query a value from the environment.
pub fn asks<U, E, Env, F>(f: F) -> Asks<F, E, Env>
where
    F: FnOnce(&Env) -> U + Send,
    U: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    Asks::new(f)
}

/// Run an effect with a modified environment.
pub fn local<Eff, F, Env2>(effect: Eff, f: F) -> Local<Eff, F, Env2>
where
    Eff: Effect,
    F: FnOnce(&Env2) -> Eff::Env + Send,
    Env2: Clone + Send + Sync,
{
    Local::new(effect, f)
}
