//! Tap combinator - runs a side effect and keeps the original value.

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Tap combinator - runs a side effect on the success value.
///
/// If the side effect fails, the whole computation fails.
///
/// # Example
///
/// ```rust,ignore
/// let effect = pure::<_, String, ()>(42).tap(|value| {
///     println!("Value: {}", value);
///     pure(())
/// });
/// assert_eq!(effect.execute(&()).await, Ok(42));
/// ```
pub struct Tap<Inner, F> {
    pub(crate) inner: Inner,
    pub(crate) f: F,
}

impl<Inner, F> std::fmt::Debug for Tap<Inner, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tap")
            .field("inner", &"<effect>")
            .field("f", &"<function>")
            .finish()
    }
}

impl<Inner, F, E2> Effect for Tap<Inner, F>
where
    Inner: Effect,
    F: FnOnce(&Inner::Output) -> E2 + Send,
    E2: Effect<Output = (), Error = Inner::Error, Env = Inner::Env>,
{
    type Output = Inner::Output;
    type Error = Inner::Error;
    type Env = Inner::Env;

    async fn run(self, env: &Self::Env) -> Result<Self::Output, Cause<Self::Error>> {
        let value = self.inner.run(env).await?;
        (self.f)(&value).run(env).await?;
        Ok(value)
    }
}
