//! The effect that succeeds with a value.

use std::marker::PhantomData;

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Succeeds with `value` without reading the environment. Its cause type
/// is never produced.
///
/// # Example
///
/// ```rust,ignore
/// let effect = pure::<_, String, ()>(42);
/// assert_eq!(effect.execute(&()).await, Ok(42));
/// ```
#[derive(Debug, Clone)]
pub struct Pure<T, E, Env> {
    value: T,
    _phantom: PhantomData<fn() -> (E, Env)>,
}

impl<T, E, Env> Pure<T, E, Env> {
    /// Wrap `value`.
    pub fn new(value: T) -> Self {
        Pure {
            value,
            _phantom: PhantomData,
        }
    }
}

impl<T, E, Env> Effect for Pure<T, E, Env>
where
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    type Output = T;
    type Error = E;
    type Env = Env;

    async fn run(self, _env: &Self::Env) -> Result<T, Cause<E>> {
        Ok(self.value)
    }
}
