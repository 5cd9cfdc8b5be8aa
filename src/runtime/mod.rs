//! Managed runtimes.
//!
//! A [`Runtime`] is a live object that executes effects against the
//! [`Context`] its [`Layer`] built. It owns every resource the layer
//! acquired and releases them exactly once, on the first call to
//! [`Runtime::dispose`]. After disposal has begun the runtime refuses to run
//! effects: they fail with [`Defect::RuntimeUnavailable`].
//!
//! Cloning a runtime clones a handle; all clones share one lifecycle.
//!
//! # Example
//!
//! ```rust,ignore
//! let runtime = Runtime::from_layer(&app_layer()).await?;
//! let user = runtime.run(fetch_user(1)).await?;
//! runtime.dispose().await;
//! runtime.dispose().await; // no-op
//! ```

pub mod adapter;
pub mod global;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::context::Context;
use crate::effect::cause::{Cause, Defect};
use crate::effect::exit::Exit;
use crate::effect::fiber::execute;
use crate::effect::scope::Scope;
use crate::effect::trait_def::Effect;
use crate::layer::Layer;

pub use adapter::{
    run_promise, run_promise_exit, run_promise_unwrapped, QueryError, RunOptions,
};
pub use global::GlobalRuntime;

const LIVE: u8 = 0;
const DISPOSING: u8 = 1;
const DISPOSED: u8 = 2;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct RuntimeInner {
    id: u64,
    context: Context,
    scope: Scope,
    state: AtomicU8,
}

/// A live, disposable effect runtime.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.inner.id)
            .field("live", &self.is_live())
            .field("context", &self.inner.context)
            .finish()
    }
}

impl PartialEq for Runtime {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Runtime {}

impl Runtime {
    /// A runtime over a hand-assembled context, with nothing to release.
    pub fn new(context: Context) -> Self {
        Self::with_scope(context, Scope::new())
    }

    fn with_scope(context: Context, scope: Scope) -> Self {
        Runtime {
            inner: Arc::new(RuntimeInner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                context,
                scope,
                state: AtomicU8::new(LIVE),
            }),
        }
    }

    /// Build a runtime from a layer.
    ///
    /// If construction fails, everything the layer acquired so far is
    /// released before the construction cause is returned.
    pub async fn from_layer<E: Send + 'static>(layer: &Layer<E>) -> Result<Self, Cause<E>> {
        let scope = Scope::new();
        match layer.build(Context::empty(), scope.clone()).await {
            Ok(context) => {
                let runtime = Self::with_scope(context, scope);
                tracing::debug!(
                    runtime = runtime.id(),
                    services = runtime.context().len(),
                    "runtime constructed"
                );
                Ok(runtime)
            }
            Err(cause) => {
                scope.close().await;
                tracing::error!(
                    category = ?cause.category(),
                    "runtime construction failed"
                );
                Err(cause)
            }
        }
    }

    /// Process-unique identifier of this runtime.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// The services this runtime provides.
    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// Whether the runtime still accepts effects.
    pub fn is_live(&self) -> bool {
        self.inner.state.load(Ordering::Acquire) == LIVE
    }

    /// Release the runtime's resources.
    ///
    /// Only the first call does any work; later calls, including concurrent
    /// ones, return without running release effects again.
    pub async fn dispose(&self) {
        if self
            .inner
            .state
            .compare_exchange(LIVE, DISPOSING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.inner.scope.close().await;
        self.inner.state.store(DISPOSED, Ordering::Release);
        tracing::debug!(runtime = self.id(), "runtime disposed");
    }

    /// Run an effect, failing with its full cause.
    pub async fn run<Eff>(&self, effect: Eff) -> Result<Eff::Output, Cause<Eff::Error>>
    where
        Eff: Effect<Env = Context>,
    {
        self.execute(effect, None).await
    }

    /// Run an effect, capturing the outcome as an [`Exit`].
    pub async fn run_exit<Eff>(&self, effect: Eff) -> Exit<Eff::Output, Eff::Error>
    where
        Eff: Effect<Env = Context>,
    {
        self.execute(effect, None).await.into()
    }

    pub(crate) async fn execute<Eff>(
        &self,
        effect: Eff,
        signal: Option<&CancellationToken>,
    ) -> Result<Eff::Output, Cause<Eff::Error>>
    where
        Eff: Effect<Env = Context>,
    {
        if !self.is_live() {
            return Err(Cause::Die(Defect::RuntimeUnavailable(format!(
                "runtime {} has been disposed",
                self.id()
            ))));
        }
        execute(effect, &self.inner.context, signal).await
    }
}

#[cfg(test)]
mod tests;
