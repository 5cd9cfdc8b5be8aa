//! Extension trait providing combinator methods for all Effects.
//!
//! The `EffectExt` trait is automatically implemented for all types
//! that implement `Effect`.

use crate::effect::boxed::BoxedEffect;
use crate::effect::cause::Cause;
use crate::effect::combinators::{AndThen, Map, MapErr, OnInterrupt, OrElse, Tap, ZipPar};
use crate::effect::reader::Local;
use crate::effect::trait_def::Effect;

/// Extension trait providing combinator methods for all Effects.
///
/// # Example
///
/// ```rust,ignore
/// use stillwater_query::effect::prelude::*;
///
/// let effect = pure::<_, String, ()>(21)
///     .map(|x| x * 2)
///     .and_then(|x| pure(x + 1))
///     .map_err(|e| format!("Error: {}", e));
///
/// assert_eq!(effect.execute(&()).await, Ok(43));
/// ```
pub trait EffectExt: Effect {
    /// Transform the success value.
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        F: FnOnce(Self::Output) -> U + Send,
        U: Send,
    {
        Map { inner: self, f }
    }

    /// Transform every expected failure.
    ///
    /// Defects and interruption are not affected.
    fn map_err<E2, F>(self, f: F) -> MapErr<Self, F>
    where
        F: FnMut(Self::Error) -> E2 + Send,
        E2: Send,
    {
        MapErr { inner: self, f }
    }

    /// Chain a dependent effect.
    ///
    /// If this effect succeeds, apply the function to produce the next effect.
    /// If this effect fails, propagate the cause.
    fn and_then<E2, F>(self, f: F) -> AndThen<Self, F>
    where
        E2: Effect<Error = Self::Error, Env = Self::Env>,
        F: FnOnce(Self::Output) -> E2 + Send,
    {
        AndThen { inner: self, f }
    }

    /// Recover from an expected failure.
    ///
    /// Defects and interruption are never recovered.
    fn or_else<E2, F>(self, f: F) -> OrElse<Self, F>
    where
        E2: Effect<Output = Self::Output, Env = Self::Env>,
        F: FnOnce(Self::Error) -> E2 + Send,
    {
        OrElse { inner: self, f }
    }

    /// Run a side effect on the success value, keeping the value.
    fn tap<E2, F>(self, f: F) -> Tap<Self, F>
    where
        F: FnOnce(&Self::Output) -> E2 + Send,
        E2: Effect<Output = (), Error = Self::Error, Env = Self::Env>,
    {
        Tap { inner: self, f }
    }

    /// Run this effect and another concurrently.
    ///
    /// If both fail, the result is a [`Cause::Parallel`].
    fn zip_par<E2>(self, other: E2) -> ZipPar<Self, E2>
    where
        E2: Effect<Error = Self::Error, Env = Self::Env>,
    {
        ZipPar {
            left: self,
            right: other,
        }
    }

    /// Run a handler effect if this effect gets interrupted.
    ///
    /// The handler completes before the interruption is reported to the
    /// caller that started the run.
    fn on_interrupt<H, F>(self, f: F) -> OnInterrupt<Self, F>
    where
        Self::Env: 'static,
        F: FnOnce() -> H + Send + 'static,
        H: Effect<Output = (), Env = Self::Env> + 'static,
    {
        OnInterrupt { inner: self, f }
    }

    /// Run this effect with a modified environment.
    fn local<F, Env2>(self, f: F) -> Local<Self, F, Env2>
    where
        F: FnOnce(&Env2) -> Self::Env + Send,
        Env2: Clone + Send + Sync,
    {
        Local::new(self, f)
    }

    /// Convert to a boxed effect for type erasure.
    fn boxed(self) -> BoxedEffect<Self::Output, Self::Error, Self::Env>
    where
        Self: 'static,
    {
        BoxedEffect::new(self)
    }

    /// Run and await the effect.
    ///
    /// This bypasses the runtime: no panic capture, no interruption
    /// bookkeeping. Handy for tests and for effects with a plain environment.
    #[allow(async_fn_in_trait)]
    async fn execute(self, env: &Self::Env) -> Result<Self::Output, Cause<Self::Error>> {
        self.run(env).await
    }

    /// Run against a default-constructed environment.
    #[allow(async_fn_in_trait)]
    async fn run_standalone(self) -> Result<Self::Output, Cause<Self::Error>>
    where
        Self::Env: Default,
    {
        let env = Self::Env::default();
        self.run(&env).await
    }
}

impl<E: Effect> EffectExt for E {}
