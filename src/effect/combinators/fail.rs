//! Expected failures.

use std::marker::PhantomData;

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Fails with `Cause::Fail(error)`.
///
/// This is the recoverable kind of failure: `or_else` sees it, and a query
/// with `throw_on_defect` reports it unwrapped. Use `die` for bugs.
///
/// # Example
///
/// ```rust,ignore
/// let effect = fail::<i32, _, ()>("UserNotFound");
/// assert_eq!(effect.execute(&()).await, Err(Cause::Fail("UserNotFound")));
/// ```
#[derive(Debug, Clone)]
pub struct Fail<T, E, Env> {
    error: E,
    _phantom: PhantomData<fn() -> (T, Env)>,
}

impl<T, E, Env> Fail<T, E, Env> {
    /// Fail with `error`.
    pub fn new(error: E) -> Self {
        Fail {
            error,
            _phantom: PhantomData,
        }
    }
}

impl<T, E, Env> Effect for Fail<T, E, Env>
where
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    type Output = T;
    type Error = E;
    type Env = Env;

    async fn run(self, _env: &Self::Env) -> Result<T, Cause<E>> {
        Err(Cause::Fail(self.error))
    }
}
