//! A process-wide runtime.
//!
//! [`GlobalRuntime`] is a lazily initialized runtime meant to live in a
//! `static`. The first [`init`](GlobalRuntime::init) builds it; later calls
//! return the same runtime, even when they race.
//!
//! ```rust,ignore
//! static RUNTIME: GlobalRuntime = GlobalRuntime::new();
//!
//! let runtime = RUNTIME.init(&app_layer()).await?;
//! ```

use tokio::sync::OnceCell;

use crate::effect::cause::Cause;
use crate::layer::Layer;
use crate::runtime::Runtime;

/// A lazily constructed runtime shared by the whole process.
#[derive(Debug)]
pub struct GlobalRuntime {
    cell: OnceCell<Runtime>,
}

impl Default for GlobalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalRuntime {
    /// An uninitialized global runtime.
    pub const fn new() -> Self {
        GlobalRuntime {
            cell: OnceCell::const_new(),
        }
    }

    /// Build the runtime from `layer` unless it already exists.
    ///
    /// A failed build leaves the global uninitialized, so a later call may
    /// try again.
    pub async fn init<E: Send + 'static>(&self, layer: &Layer<E>) -> Result<Runtime, Cause<E>> {
        self.cell
            .get_or_try_init(|| Runtime::from_layer(layer))
            .await
            .cloned()
    }

    /// The runtime, if it has been initialized.
    pub fn get(&self) -> Option<Runtime> {
        self.cell.get().cloned()
    }

    /// Dispose the runtime if it was initialized.
    ///
    /// The runtime stays installed; effects run on it afterwards fail with
    /// [`Defect::RuntimeUnavailable`](crate::effect::Defect::RuntimeUnavailable).
    pub async fn dispose(&self) {
        if let Some(runtime) = self.cell.get() {
            runtime.dispose().await;
        }
    }
}
