//! OnInterrupt combinator - runs a handler when the effect is interrupted.

use crate::effect::boxed::BoxFuture;
use crate::effect::cause::Cause;
use crate::effect::fiber::FinalizerGuard;
use crate::effect::trait_def::Effect;

/// Runs a handler effect if the wrapped effect is interrupted.
///
/// The handler runs to completion before the interruption is reported,
/// whether the interruption comes from the enclosing run being cancelled
/// or from a nested run that reported [`Cause::Interrupt`].
///
/// # Example
///
/// ```rust,ignore
/// let effect = long_poll()
///     .on_interrupt(|| from_async(|_: &Context| async { release_lease().await }));
/// ```
pub struct OnInterrupt<Inner, F> {
    pub(crate) inner: Inner,
    pub(crate) f: F,
}

impl<Inner, F> std::fmt::Debug for OnInterrupt<Inner, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnInterrupt")
            .field("inner", &"<effect>")
            .field("f", &"<function>")
            .finish()
    }
}

impl<Inner, F, H> Effect for OnInterrupt<Inner, F>
where
    Inner: Effect,
    Inner::Env: 'static,
    F: FnOnce() -> H + Send + 'static,
    H: Effect<Output = (), Env = Inner::Env> + 'static,
{
    type Output = Inner::Output;
    type Error = Inner::Error;
    type Env = Inner::Env;

    async fn run(self, env: &Self::Env) -> Result<Self::Output, Cause<Self::Error>> {
        let handler_env = env.clone();
        let handler = self.f;
        let guard = FinalizerGuard::new(Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move {
                if handler().run(&handler_env).await.is_err() {
                    tracing::warn!("interruption handler failed");
                }
            })
        }));

        let result = self.inner.run(env).await;
        let interrupted = matches!(&result, Err(cause) if cause.is_interrupted());
        if let Some(handler) = guard.disarm() {
            if interrupted {
                handler().await;
            }
        }
        result
    }
}
