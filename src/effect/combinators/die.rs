//! Die effect - a defect.

use std::marker::PhantomData;

use crate::effect::cause::{Cause, Defect};
use crate::effect::trait_def::Effect;

/// An effect that fails with a defect instead of an expected error.
#[derive(Debug, Clone)]
pub struct Die<T, E, Env> {
    defect: Defect,
    _phantom: PhantomData<fn() -> (T, E, Env)>,
}

impl<T, E, Env> Die<T, E, Env> {
    /// Create a new Die effect.
    pub fn new(defect: Defect) -> Self {
        Die {
            defect,
            _phantom: PhantomData,
        }
    }
}

impl<T, E, Env> Effect for Die<T, E, Env>
where
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    type Output = T;
    type Error = E;
    type Env = Env;

    async fn run(self, _env: &Self::Env) -> Result<T, Cause<E>> {
        Err(Cause::Die(self.defect))
    }
}
