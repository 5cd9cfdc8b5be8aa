//! MapErr combinator.

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Transforms every expected failure in the cause.
///
/// `f` is applied to each `Cause::Fail` leaf, so a parallel cause with two
/// failures calls it twice. Defects and interruptions pass through
/// untouched, which is why `f` is `FnMut` rather than `FnOnce`.
///
/// # Example
///
/// ```rust,ignore
/// let effect = fail::<i32, _, ()>("error")
///     .map_err(|e: &str| format!("wrapped: {}", e));
/// assert_eq!(effect.execute(&()).await, Err(Cause::Fail("wrapped: error".to_string())));
/// ```
pub struct MapErr<Inner, F> {
    pub(crate) inner: Inner,
    pub(crate) f: F,
}

impl<Inner, F> std::fmt::Debug for MapErr<Inner, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapErr")
            .field("inner", &"<effect>")
            .field("f", &"<function>")
            .finish()
    }
}

impl<Inner, F, E2> Effect for MapErr<Inner, F>
where
    Inner: Effect,
    F: FnMut(Inner::Error) -> E2 + Send,
    E2: Send,
{
    type Output = Inner::Output;
    type Error = E2;
    type Env = Inner::Env;

    async fn run(self, env: &Self::Env) -> Result<Self::Output, Cause<E2>> {
        let f = self.f;
        self.inner.run(env).await.map_err(|cause| cause.map(f))
    }
}
