//! Tracing support for effects.
//!
//! This module provides the `Instrument` combinator and `instrument` method
//! for wrapping effects in tracing spans.

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// An effect wrapped in a tracing span.
///
/// Created by [`EffectTracingExt::instrument`].
#[derive(Debug)]
pub struct Instrument<E> {
    pub(crate) inner: E,
    pub(crate) span: tracing::Span,
}

impl<E> Effect for Instrument<E>
where
    E: Effect,
{
    type Output = E::Output;
    type Error = E::Error;
    type Env = E::Env;

    async fn run(self, env: &Self::Env) -> Result<Self::Output, Cause<Self::Error>> {
        use tracing::Instrument as _;
        self.inner.run(env).instrument(self.span).await
    }
}

/// Extension trait for adding tracing instrumentation to effects.
pub trait EffectTracingExt: Effect {
    /// Wrap this effect in a tracing span.
    ///
    /// The span is entered whenever the effect is polled.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use tracing::debug_span;
    ///
    /// fn fetch_todo(id: u32) -> impl Effect<Output = Todo, Error = TodoError, Env = Context> {
    ///     todo_client()
    ///         .and_then(move |client| client.get(id))
    ///         .instrument(debug_span!("fetch_todo", id))
    /// }
    /// ```
    fn instrument(self, span: tracing::Span) -> Instrument<Self> {
        Instrument { inner: self, span }
    }
}

impl<E: Effect> EffectTracingExt for E {}
