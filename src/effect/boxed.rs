//! Type-erased effects.
//!
//! Effects are zero-cost by default: every combinator is its own type. Box
//! one when the type has to be named, for instance to keep callbacks in an
//! options record or to return different effects from match arms.
//!
//! Boxing clones the environment so the boxed future is `'static`. With
//! [`Context`](crate::context::Context) that is a handful of `Arc` clones.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// A pinned, boxed, `Send` future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A type-erased effect.
///
/// Runs exactly like the effect it wraps, including the full `Cause` on
/// failure.
///
/// # Example
///
/// ```rust,ignore
/// fn load(cached: bool) -> BoxedEffect<User, UserError, Context> {
///     if cached {
///         from_cache().boxed()
///     } else {
///         from_database().boxed()
///     }
/// }
/// ```
pub struct BoxedEffect<T, E, Env> {
    run_fn: Box<dyn FnOnce(Env) -> BoxFuture<'static, Result<T, Cause<E>>> + Send>,
    _phantom: PhantomData<fn() -> Env>,
}

impl<T, E, Env> std::fmt::Debug for BoxedEffect<T, E, Env> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxedEffect")
            .field("run_fn", &"<function>")
            .finish()
    }
}

impl<T, E, Env> BoxedEffect<T, E, Env>
where
    T: Send + 'static,
    E: Send + 'static,
    Env: Clone + Send + Sync + 'static,
{
    /// Box `effect`.
    pub fn new<Eff>(effect: Eff) -> Self
    where
        Eff: Effect<Output = T, Error = E, Env = Env> + 'static,
    {
        BoxedEffect {
            run_fn: Box::new(move |env: Env| {
                Box::pin(async move { effect.run(&env).await })
            }),
            _phantom: PhantomData,
        }
    }
}

impl<T, E, Env> Effect for BoxedEffect<T, E, Env>
where
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    type Output = T;
    type Error = E;
    type Env = Env;

    fn run(self, env: &Env) -> impl Future<Output = Result<T, Cause<E>>> + Send {
        (self.run_fn)(env.clone())
    }
}
