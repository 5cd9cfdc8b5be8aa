//! Effect trait definition - the core abstraction for typed, lazy effects.
//!
//! An effect is a description of a computation that:
//! - Produces a value of type `Output` on success
//! - May fail with a [`Cause`] carrying expected errors of type `Error`,
//!   defects, or interruption
//! - Depends on an environment of type `Env`
//!
//! Nothing runs until [`Effect::run`] is called. Combinators return concrete
//! types, following the same pattern as `Future` and `Iterator`; use
//! `.boxed()` when type erasure is needed.
//!
//! # Environment
//!
//! Effects executed by a [`Runtime`](crate::runtime::Runtime) use
//! [`Context`](crate::context::Context) as their environment. Effects written
//! against another environment can be adapted with `.local(..)`.

use std::future::Future;

use crate::effect::cause::Cause;

/// The core Effect trait - represents a computation that may perform effects.
///
/// # Type Parameters
///
/// * `Output` - The success type produced by this effect (must be `Send`)
/// * `Error` - The expected failure type (must be `Send`)
/// * `Env` - The environment type required to run this effect (must be `Clone + Send + Sync`)
///
/// # Example
///
/// ```rust,ignore
/// use stillwater_query::effect::prelude::*;
///
/// fn fetch_user(id: u32) -> impl Effect<Output = User, Error = UserError, Env = Context> {
///     service::<UserRepo>().and_then(move |repo| from_async(move |_| repo.find(id)))
/// }
/// ```
pub trait Effect: Sized + Send {
    /// The success type produced by this effect.
    type Output: Send;

    /// The expected failure type.
    type Error: Send;

    /// The environment type required to run this effect.
    ///
    /// Must be `Clone` to support boxing (cloning is deferred until boxing).
    type Env: Clone + Send + Sync;

    /// Execute this effect with the given environment.
    ///
    /// The returned future resolves to `Ok(output)` on success or to the
    /// full failure [`Cause`] otherwise.
    fn run(
        self,
        env: &Self::Env,
    ) -> impl Future<Output = Result<Self::Output, Cause<Self::Error>>> + Send;
}
