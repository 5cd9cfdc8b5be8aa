//! Interruption-safe acquire/use/release.
//!
//! [`acquire_release`] acquires a resource, hands a reference to the use
//! function, and always releases the resource afterwards: after success,
//! after an expected failure, after a defect, and after interruption. In the
//! interruption case the release runs before the interruption is reported.
//!
//! Release failures are logged and do not change the use result.
//!
//! # Example
//!
//! ```rust,ignore
//! use stillwater_query::effect::prelude::*;
//!
//! let effect = acquire_release(
//!     open_connection(),
//!     |conn| from_async(move |_: &Context| async move { conn.close().await }),
//!     |conn| fetch_user(conn.clone(), user_id),
//! );
//! ```

use crate::effect::boxed::BoxFuture;
use crate::effect::cause::Cause;
use crate::effect::fiber::FinalizerGuard;
use crate::effect::trait_def::Effect;

/// Acquire/use/release combinator type.
///
/// Created by [`acquire_release`].
pub struct AcquireRelease<Acquire, Use, Release> {
    acquire: Acquire,
    use_fn: Use,
    release: Release,
}

impl<Acquire, Use, Release> std::fmt::Debug for AcquireRelease<Acquire, Use, Release> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquireRelease")
            .field("acquire", &"<effect>")
            .field("use_fn", &"<function>")
            .field("release", &"<function>")
            .finish()
    }
}

impl<Acquire, Use, Release, UseEffect, RelEffect, R> Effect
    for AcquireRelease<Acquire, Use, Release>
where
    Acquire: Effect<Output = R>,
    Acquire::Env: 'static,
    R: Clone + Send + Sync + 'static,
    Use: FnOnce(&R) -> UseEffect + Send,
    UseEffect: Effect<Error = Acquire::Error, Env = Acquire::Env>,
    Release: FnOnce(R) -> RelEffect + Send + 'static,
    RelEffect: Effect<Output = (), Env = Acquire::Env> + 'static,
{
    type Output = UseEffect::Output;
    type Error = Acquire::Error;
    type Env = Acquire::Env;

    async fn run(self, env: &Self::Env) -> Result<Self::Output, Cause<Self::Error>> {
        let resource = self.acquire.run(env).await?;

        let held = resource.clone();
        let release_env = env.clone();
        let release = self.release;
        let guard = FinalizerGuard::new(Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move {
                if release(held).run(&release_env).await.is_err() {
                    tracing::warn!("resource release failed");
                }
            })
        }));

        let result = (self.use_fn)(&resource).run(env).await;

        if let Some(release) = guard.disarm() {
            release().await;
        }
        result
    }
}

/// Acquire a resource, use it, and release it on every exit path.
///
/// # Type Parameters
///
/// * `acquire` - Effect that acquires the resource
/// * `release` - Function producing the release effect (receives ownership)
/// * `use_fn` - Function that uses the resource (receives a reference)
pub fn acquire_release<Acquire, Use, Release, UseEffect, RelEffect, R>(
    acquire: Acquire,
    release: Release,
    use_fn: Use,
) -> AcquireRelease<Acquire, Use, Release>
where
    Acquire: Effect<Output = R>,
    Acquire::Env: 'static,
    R: Clone + Send + Sync + 'static,
    Use: FnOnce(&R) -> UseEffect + Send,
    UseEffect: Effect<Error = Acquire::Error, Env = Acquire::Env>,
    Release: FnOnce(R) -> RelEffect + Send + 'static,
    RelEffect: Effect<Output = (), Env = Acquire::Env> + 'static,
{
    AcquireRelease {
        acquire,
        use_fn,
        release,
    }
}
