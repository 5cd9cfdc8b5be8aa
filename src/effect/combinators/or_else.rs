//! OrElse combinator - recovers from an expected failure.

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// OrElse combinator - recovers from an expected failure.
///
/// The first expected failure in the cause is handed to the recovery
/// function. A cause without expected failures (defects, interruption)
/// keeps propagating.
///
/// # Example
///
/// ```rust,ignore
/// let effect = fail::<i32, _, ()>("error").or_else(|_| pure(42));
/// assert_eq!(effect.execute(&()).await, Ok(42));
/// ```
pub struct OrElse<Inner, F> {
    pub(crate) inner: Inner,
    pub(crate) f: F,
}

impl<Inner, F> std::fmt::Debug for OrElse<Inner, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrElse")
            .field("inner", &"<effect>")
            .field("f", &"<function>")
            .finish()
    }
}

impl<Inner, F, E2> Effect for OrElse<Inner, F>
where
    Inner: Effect,
    E2: Effect<Output = Inner::Output, Env = Inner::Env>,
    F: FnOnce(Inner::Error) -> E2 + Send,
{
    type Output = Inner::Output;
    type Error = E2::Error;
    type Env = Inner::Env;

    async fn run(self, env: &Self::Env) -> Result<Self::Output, Cause<Self::Error>> {
        match self.inner.run(env).await {
            Ok(value) => Ok(value),
            Err(cause) => match cause.failure_or_cause() {
                Ok(error) => (self.f)(error).run(env).await,
                Err(cause) => Err(cause.without_failures().unwrap_or(Cause::Interrupt)),
            },
        }
    }
}
