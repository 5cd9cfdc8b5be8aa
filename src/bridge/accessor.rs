//! Access to the runtime that bridged queries run on.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use leptos_reactive::{use_context, RwSignal, SignalGet, SignalSet};
use tokio::sync::watch;
use tokio_util::task::TaskTracker;

use crate::effect::cause::Defect;
use crate::runtime::{GlobalRuntime, Runtime};

/// Lifecycle of a provided runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeStatus {
    /// The layer is still being built.
    Pending,
    /// The runtime is live.
    Ready(Runtime),
    /// The layer failed to build. Not retried.
    Failed(Defect),
    /// The providing scope was torn down.
    Disposed,
}

impl RuntimeStatus {
    /// Whether the runtime can run effects.
    pub fn is_ready(&self) -> bool {
        matches!(self, RuntimeStatus::Ready(_))
    }

    /// Whether the runtime is still being built.
    pub fn is_pending(&self) -> bool {
        matches!(self, RuntimeStatus::Pending)
    }
}

/// The status a provider publishes, observable both reactively and from
/// async code.
///
/// The signal belongs to the provider's owner and is gone once the provider
/// is torn down; the watch channel outlives it.
#[derive(Clone)]
pub(crate) struct ProvidedRuntime {
    signal: RwSignal<RuntimeStatus>,
    sender: Rc<watch::Sender<RuntimeStatus>>,
    tasks: TaskTracker,
    release_on_cleanup: Rc<Cell<bool>>,
}

impl ProvidedRuntime {
    /// A pending status owned by the current owner.
    pub(crate) fn new() -> Self {
        let (sender, _) = watch::channel(RuntimeStatus::Pending);
        ProvidedRuntime {
            signal: RwSignal::new(RuntimeStatus::Pending),
            sender: Rc::new(sender),
            tasks: TaskTracker::new(),
            release_on_cleanup: Rc::new(Cell::new(true)),
        }
    }

    pub(crate) fn set(&self, status: RuntimeStatus) {
        self.sender.send_replace(status.clone());
        let _ = self.signal.try_set(status);
    }

    pub(crate) fn get_untracked(&self) -> RuntimeStatus {
        self.sender.borrow().clone()
    }

    fn get(&self) -> RuntimeStatus {
        self.signal
            .try_get()
            .unwrap_or_else(|| self.get_untracked())
    }

    /// Fetches running on this provider's runtime.
    pub(crate) fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    /// Whoever calls this first releases the runtime.
    pub(crate) fn claim_release(&self) -> bool {
        self.release_on_cleanup.replace(false)
    }
}

#[derive(Clone)]
enum Source {
    Fixed(Runtime),
    Global(&'static GlobalRuntime),
    Provided(ProvidedRuntime),
    Missing(&'static str),
}

/// Where a query finds its runtime.
///
/// The three constructors stay separate because their runtimes are
/// disposed at different times: a provided runtime when its scope is torn
/// down, a fixed one by its creator, a global one explicitly.
#[derive(Clone)]
pub struct RuntimeAccessor {
    source: Source,
}

impl fmt::Debug for RuntimeAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            Source::Fixed(runtime) => format!("fixed({})", runtime.id()),
            Source::Global(_) => "global".to_string(),
            Source::Provided(_) => "provided".to_string(),
            Source::Missing(reason) => format!("missing({})", reason),
        };
        f.debug_struct("RuntimeAccessor")
            .field("source", &source)
            .finish()
    }
}

impl RuntimeAccessor {
    /// Always use `runtime`.
    pub fn fixed(runtime: Runtime) -> Self {
        RuntimeAccessor {
            source: Source::Fixed(runtime),
        }
    }

    /// Use the process-wide runtime held by `global`.
    pub fn global(global: &'static GlobalRuntime) -> Self {
        RuntimeAccessor {
            source: Source::Global(global),
        }
    }

    /// Use the runtime of the nearest enclosing provider, of any scope.
    ///
    /// Outside of any provider the accessor reports
    /// [`RuntimeStatus::Failed`].
    pub fn from_context() -> Self {
        match use_context::<ProvidedRuntime>() {
            Some(provided) => Self::provided(provided),
            None => Self::missing(),
        }
    }

    pub(crate) fn provided(provided: ProvidedRuntime) -> Self {
        RuntimeAccessor {
            source: Source::Provided(provided),
        }
    }

    pub(crate) fn missing() -> Self {
        RuntimeAccessor {
            source: Source::Missing("no runtime provider in scope"),
        }
    }

    /// Current status; tracked for provided runtimes.
    pub fn status(&self) -> RuntimeStatus {
        match &self.source {
            Source::Provided(provided) => provided.get(),
            _ => self.status_untracked(),
        }
    }

    fn status_untracked(&self) -> RuntimeStatus {
        match &self.source {
            Source::Fixed(runtime) => live(runtime.clone()),
            Source::Global(global) => match global.get() {
                Some(runtime) => live(runtime),
                None => RuntimeStatus::Failed(Defect::RuntimeUnavailable(
                    "global runtime has not been initialized".to_string(),
                )),
            },
            Source::Provided(provided) => provided.get_untracked(),
            Source::Missing(reason) => {
                RuntimeStatus::Failed(Defect::RuntimeUnavailable((*reason).to_string()))
            }
        }
    }

    /// The live runtime, or the defect explaining why there is none.
    ///
    /// Never returns a runtime that is still being built or was disposed.
    pub fn resolve(&self) -> Result<Runtime, Defect> {
        match self.status_untracked() {
            RuntimeStatus::Ready(runtime) if runtime.is_live() => Ok(runtime),
            RuntimeStatus::Ready(_) | RuntimeStatus::Disposed => Err(
                Defect::RuntimeUnavailable("runtime has been disposed".to_string()),
            ),
            RuntimeStatus::Pending => Err(Defect::RuntimeUnavailable(
                "runtime is still being built".to_string(),
            )),
            RuntimeStatus::Failed(defect) => Err(defect),
        }
    }

    /// Resolve once the runtime has left [`RuntimeStatus::Pending`].
    ///
    /// Only a provided runtime is ever pending; every other source resolves
    /// immediately.
    pub fn ready(&self) -> impl Future<Output = Result<Runtime, Defect>> + 'static {
        let accessor = self.clone();
        async move {
            if let Source::Provided(provided) = &accessor.source {
                let mut changes = provided.sender.subscribe();
                let _ = changes.wait_for(|status| !status.is_pending()).await;
            }
            accessor.resolve()
        }
    }

    /// Whether [`resolve`](Self::resolve) would succeed, tracked.
    pub fn is_ready(&self) -> bool {
        self.status().is_ready()
    }

    /// Run `fut` so that tearing down the providing scope waits for it.
    pub(crate) fn track<F: Future>(&self, fut: F) -> impl Future<Output = F::Output> {
        let tracker = match &self.source {
            Source::Provided(provided) => Some(provided.tasks().token()),
            _ => None,
        };
        async move {
            let output = fut.await;
            drop(tracker);
            output
        }
    }
}

fn live(runtime: Runtime) -> RuntimeStatus {
    if runtime.is_live() {
        RuntimeStatus::Ready(runtime)
    } else {
        RuntimeStatus::Disposed
    }
}
