//! Fiber bookkeeping for interruption.
//!
//! Every effect run started by [`execute`] gets its own task-local
//! [`Scope`]. Combinators that must run cleanup when they are cancelled
//! (interruption handlers, bracket releases, scoped resources) hold a
//! [`FinalizerGuard`] while the protected effect runs. If the running future
//! is dropped before the guard is disarmed, the guard hands its finalizer to
//! the fiber scope, and [`execute`] awaits it before reporting the
//! interruption.

use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::effect::cause::{Cause, Defect};
use crate::effect::scope::{Finalizer, Scope};
use crate::effect::trait_def::Effect;

tokio::task_local! {
    static FIBER: Scope;
}

/// The finalizer scope of the fiber running on this task, if any.
pub(crate) fn current() -> Option<Scope> {
    FIBER.try_with(|scope| scope.clone()).ok()
}

/// Holds a finalizer while a protected region runs.
pub(crate) struct FinalizerGuard {
    finalizer: Option<Finalizer>,
    fiber: Option<Scope>,
}

impl fmt::Debug for FinalizerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalizerGuard")
            .field("armed", &self.finalizer.is_some())
            .finish()
    }
}

impl FinalizerGuard {
    pub(crate) fn new(finalizer: Finalizer) -> Self {
        FinalizerGuard {
            finalizer: Some(finalizer),
            fiber: current(),
        }
    }

    /// Take the finalizer back after the region completed normally.
    pub(crate) fn disarm(mut self) -> Option<Finalizer> {
        self.finalizer.take()
    }
}

impl Drop for FinalizerGuard {
    fn drop(&mut self) {
        let Some(finalizer) = self.finalizer.take() else {
            return;
        };
        let rejected = match &self.fiber {
            Some(fiber) => fiber.add_boxed(finalizer).err(),
            None => Some(finalizer),
        };
        // Outside a fiber there is nobody left to await the release.
        if let Some(finalizer) = rejected {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(finalizer());
                }
                Err(_) => tracing::warn!("finalizer dropped outside of a tokio runtime"),
            }
        }
    }
}

/// Run an effect as a fiber.
///
/// Panics become [`Defect::Panic`]. When `signal` is cancelled before the
/// effect settles, the effect's future is dropped, every pending finalizer
/// runs to completion, and the result is [`Cause::Interrupt`].
pub(crate) async fn execute<Eff>(
    effect: Eff,
    env: &Eff::Env,
    signal: Option<&CancellationToken>,
) -> Result<Eff::Output, Cause<Eff::Error>>
where
    Eff: Effect,
{
    let fiber = Scope::new();
    let run = FIBER.scope(fiber.clone(), AssertUnwindSafe(effect.run(env)).catch_unwind());

    let outcome = match signal {
        Some(signal) => {
            tokio::select! {
                biased;
                _ = signal.cancelled() => None,
                result = run => Some(result),
            }
        }
        None => Some(run.await),
    };

    fiber.close().await;
    match outcome {
        Some(Ok(result)) => result,
        Some(Err(payload)) => {
            let defect = Defect::from_panic(payload);
            tracing::debug!(%defect, "effect panicked");
            Err(Cause::Die(defect))
        }
        None => {
            tracing::debug!("effect interrupted");
            Err(Cause::Interrupt)
        }
    }
}
