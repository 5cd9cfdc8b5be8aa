//! FromAsync effect - wraps an async function reading the environment.

use std::future::Future;
use std::marker::PhantomData;

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Effect created from an async function.
///
/// The future is created lazily when the effect runs. An `Err` it resolves
/// to is an expected failure.
pub struct FromAsync<F, Env> {
    f: F,
    _phantom: PhantomData<fn() -> Env>,
}

impl<F, Env> std::fmt::Debug for FromAsync<F, Env> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FromAsync").field("f", &"<function>").finish()
    }
}

impl<F, Env> FromAsync<F, Env> {
    /// Create a new FromAsync effect.
    pub fn new(f: F) -> Self {
        FromAsync {
            f,
            _phantom: PhantomData,
        }
    }
}

impl<F, Fut, T, E, Env> Effect for FromAsync<F, Env>
where
    F: FnOnce(&Env) -> Fut + Send,
    Fut: Future<Output = Result<T, E>> + Send,
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    type Output = T;
    type Error = E;
    type Env = Env;

    async fn run(self, env: &Self::Env) -> Result<T, Cause<E>> {
        (self.f)(env).await.map_err(Cause::Fail)
    }
}
