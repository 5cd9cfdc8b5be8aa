//! Effects from synchronous functions.

use std::marker::PhantomData;

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Calls `f` with the environment when run.
///
/// An `Err` it returns becomes `Cause::Fail`. A panic inside `f` is not
/// caught here; the runtime turns it into `Defect::Panic` when the effect
/// runs on a fiber.
pub struct FromFn<F, Env> {
    f: F,
    _phantom: PhantomData<fn() -> Env>,
}

impl<F, Env> std::fmt::Debug for FromFn<F, Env> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FromFn").field("f", &"<function>").finish()
    }
}

impl<F, Env> FromFn<F, Env> {
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        FromFn {
            f,
            _phantom: PhantomData,
        }
    }
}

impl<F, T, E, Env> Effect for FromFn<F, Env>
where
    F: FnOnce(&Env) -> Result<T, E> + Send,
    T: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    type Output = T;
    type Error = E;
    type Env = Env;

    async fn run(self, env: &Self::Env) -> Result<T, Cause<E>> {
        (self.f)(env).map_err(Cause::Fail)
    }
}
