//! Sequencing of dependent effects.

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Runs `inner`, then the effect `f` builds from its output.
///
/// If `inner` fails, dies or is interrupted, `f` is never called and the
/// whole cause is returned as is. Both halves share one error type, so a
/// `Cause<E>` coming out of the chain may hold failures from either side.
/// Convert first with `map_err` when they differ:
///
/// ```rust,ignore
/// fetch_user(id)                           // Error = DbError
///     .map_err(AppError::from)             // Error = AppError
///     .and_then(|user| send_email(user))   // Error = AppError
/// ```
pub struct AndThen<Inner, F> {
    pub(crate) inner: Inner,
    pub(crate) f: F,
}

impl<Inner, F> std::fmt::Debug for AndThen<Inner, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AndThen")
            .field("inner", &"<effect>")
            .field("f", &"<function>")
            .finish()
    }
}

impl<Inner, F, E2> Effect for AndThen<Inner, F>
where
    Inner: Effect,
    E2: Effect<Error = Inner::Error, Env = Inner::Env>,
    F: FnOnce(Inner::Output) -> E2 + Send,
{
    type Output = E2::Output;
    type Error = Inner::Error;
    type Env = Inner::Env;

    async fn run(self, env: &Self::Env) -> Result<Self::Output, Cause<Self::Error>> {
        let value = self.inner.run(env).await?;
        (self.f)(value).run(env).await
    }
}
