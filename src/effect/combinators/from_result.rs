//! Lifting a `Result`.

use std::marker::PhantomData;

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Succeeds with the `Ok` value or fails with `Cause::Fail` of the `Err`.
#[derive(Debug, Clone)]
pub struct FromResult<T, E, Env> {
    result: Result<T, E>,
    _phantom: PhantomData<fn() -> Env>,
}

impl<T, E, Env> FromResult<T, E, Env> {
    /// Lift `result`.
    pub fn new(result: Result<T, E>) -> Self {
        FromResult {
            result,
            _phantom: PhantomData,
        }
    }
}

impl<T, E, Env> Effect for FromResult<T, E, Env>
where
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    type Output = T;
    type Error = E;
    type Env = Env;

    async fn run(self, _env: &Self::Env) -> Result<T, Cause<E>> {
        self.result.map_err(Cause::Fail)
    }
}
