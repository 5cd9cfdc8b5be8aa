//! Reading and replacing the environment.

use std::marker::PhantomData;

use crate::effect::cause::Cause;
use crate::effect::trait_def::Effect;

/// Succeeds with `f(env)`. Never fails.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone)]
/// struct Env { value: i32 }
///
/// let effect = asks::<_, String, _, _>(|env: &Env| env.value * 2);
/// assert_eq!(effect.execute(&Env { value: 21 }).await, Ok(42));
/// ```
pub struct Asks<F, E, Env> {
    f: F,
    _phantom: PhantomData<fn() -> (E, Env)>,
}

impl<F, E, Env> std::fmt::Debug for Asks<F, E, Env> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asks").field("f", &"<function>").finish()
    }
}

impl<F, E, Env> Asks<F, E, Env> {
    /// Read with `f`.
    pub fn new(f: F) -> Self {
        Asks {
            f,
            _phantom: PhantomData,
        }
    }
}

impl<F, U, E, Env> Effect for Asks<F, E, Env>
where
    F: FnOnce(&Env) -> U + Send,
    U: Send,
    E: Send,
    Env: Clone + Send + Sync,
{
    type Output = U;
    type Error = E;
    type Env = Env;

    async fn run(self, env: &Env) -> Result<U, Cause<E>> {
        Ok((self.f)(env))
    }
}

/// Run an effect with a modified environment.
///
/// Mostly used to adapt effects written against a narrow environment to
/// the [`Context`](crate::context::Context) a runtime provides.
///
/// # Example
///
/// ```rust,ignore
/// let inner = asks::<_, String, Settings, _>(|s| s.page_size);
/// let effect = inner.local(|ctx: &Context| ctx.get::<SettingsTag>().unwrap_or_default());
/// ```
pub struct Local<Inner, F, Env2> {
    pub(crate) inner: Inner,
    pub(crate) f: F,
    pub(crate) _phantom: PhantomData<fn() -> Env2>,
}

impl<Inner, F, Env2> std::fmt::Debug for Local<Inner, F, Env2> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Local")
            .field("inner", &"<effect>")
            .field("f", &"<function>")
            .finish()
    }
}

impl<Inner, F, Env2> Local<Inner, F, Env2> {
    /// Run `inner` on the environment `f` derives.
    pub fn new(inner: Inner, f: F) -> Self {
        Local {
            inner,
            f,
            _phantom: PhantomData,
        }
    }
}

impl<Inner, F, Env2> Effect for Local<Inner, F, Env2>
where
    Inner: Effect,
    F: FnOnce(&Env2) -> Inner::Env + Send,
    Env2: Clone + Send + Sync,
{
    type Output = Inner::Output;
    type Error = Inner::Error;
    type Env = Env2;

    async fn run(self, env: &Env2) -> Result<Self::Output, Cause<Self::Error>> {
        let inner_env = (self.f)(env);
        self.inner.run(&inner_env).await
    }
}
