//! Runtime providers scoped to a reactive owner.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use leptos_reactive::{
    as_child_of_current_owner, on_cleanup, provide_context, use_context, with_owner, Disposer,
    Owner,
};

use crate::bridge::accessor::{ProvidedRuntime, RuntimeAccessor, RuntimeStatus};
use crate::bridge::hooks::{
    EffectInfiniteQueryOptions, EffectMutationOptions, EffectQueries, EffectQueryOptions,
};
use crate::bridge::infinite::EffectInfiniteQuery;
use crate::bridge::mutation::EffectMutation;
use crate::bridge::query::{CacheValue, EffectQuery};
use crate::context::Context;
use crate::effect::cause::Defect;
use crate::effect::trait_def::Effect;
use crate::layer::Layer;
use crate::runtime::Runtime;

static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

/// Providers of every scope visible from an owner, by slot.
#[derive(Clone, Default)]
struct ScopeSlots(Rc<HashMap<u64, ProvidedRuntime>>);

/// A family of runtime providers built from one layer function.
///
/// Each scope gets its own context slot, so nested providers of different
/// scopes do not shadow each other.
pub struct RuntimeScope<Args, LE> {
    slot: u64,
    layer_fn: Rc<dyn Fn(&Args) -> Layer<LE>>,
}

impl<Args, LE> Clone for RuntimeScope<Args, LE> {
    fn clone(&self) -> Self {
        RuntimeScope {
            slot: self.slot,
            layer_fn: self.layer_fn.clone(),
        }
    }
}

impl<Args, LE> fmt::Debug for RuntimeScope<Args, LE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeScope")
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// Create a runtime scope whose providers build their runtime from
/// `layer_fn(args)`.
///
/// ```rust,ignore
/// let app = make_runtime_scope(|config: &Config| database_layer(config.url.clone()));
/// let provider = app.provider(config, || {
///     let users = app.use_effect_query(|| {
///         EffectQueryOptions::new(query_key!["users"], |_| list_users())
///     });
/// });
/// ```
pub fn make_runtime_scope<Args, LE, F>(layer_fn: F) -> RuntimeScope<Args, LE>
where
    F: Fn(&Args) -> Layer<LE> + 'static,
    LE: fmt::Display + Send + 'static,
{
    RuntimeScope {
        slot: NEXT_SLOT.fetch_add(1, Ordering::Relaxed),
        layer_fn: Rc::new(layer_fn),
    }
}

/// A mounted provider.
///
/// Dropping it tears the provider down and disposes its runtime in the
/// background; [`dispose`](Self::dispose) does the same and waits.
pub struct RuntimeProvider {
    provided: ProvidedRuntime,
    disposer: Option<Disposer>,
}

impl fmt::Debug for RuntimeProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeProvider")
            .field("status", &self.provided.get_untracked())
            .field("mounted", &self.disposer.is_some())
            .finish()
    }
}

impl RuntimeProvider {
    /// The provider's current status, untracked.
    pub fn status(&self) -> RuntimeStatus {
        self.provided.get_untracked()
    }

    /// Tear the provider down.
    ///
    /// Fetches in flight are interrupted; this waits for their finalizers
    /// and then for the runtime's release effects.
    pub async fn dispose(mut self) {
        let previous = self.provided.get_untracked();
        let release = self.provided.claim_release();
        drop(self.disposer.take());

        if let (true, RuntimeStatus::Ready(runtime)) = (release, previous) {
            release_after_fetches(&self.provided, runtime).await;
        }
    }
}

impl<Args, LE> RuntimeScope<Args, LE>
where
    LE: fmt::Display + Send + 'static,
{
    /// Mount a provider under the current owner and run `children` inside it.
    ///
    /// The layer function is called once, here. The runtime is built on a
    /// local task; until it is ready the provider's queries wait. A runtime
    /// that finishes building after the provider was torn down is disposed
    /// as soon as it is ready.
    ///
    /// Must be called inside a [`LocalSet`](tokio::task::LocalSet).
    pub fn provider(&self, args: Args, children: impl FnOnce()) -> RuntimeProvider {
        let (owner, disposer) = as_child_of_current_owner(|()| Owner::current())(());
        let layer = (self.layer_fn)(&args);
        let slot = self.slot;
        let mount = move || {
            let provided = ProvidedRuntime::new();
            let mut slots = use_context::<ScopeSlots>()
                .map(|ScopeSlots(slots)| (*slots).clone())
                .unwrap_or_default();
            slots.insert(slot, provided.clone());
            provide_context(ScopeSlots(Rc::new(slots)));
            provide_context(provided.clone());

            let torn_down = Rc::new(Cell::new(false));
            tokio::task::spawn_local(build_runtime(layer, provided.clone(), torn_down.clone()));

            on_cleanup({
                let provided = provided.clone();
                move || {
                    torn_down.set(true);
                    let previous = provided.get_untracked();
                    provided.set(RuntimeStatus::Disposed);
                    if let RuntimeStatus::Ready(runtime) = previous {
                        if provided.claim_release() {
                            let provided = provided.clone();
                            tokio::task::spawn_local(async move {
                                release_after_fetches(&provided, runtime).await
                            });
                        }
                    }
                }
            });

            children();
            provided
        };
        let provided = match owner {
            Some(owner) => with_owner(owner, mount),
            None => mount(),
        };
        RuntimeProvider {
            provided,
            disposer: Some(disposer),
        }
    }

    /// Accessor for this scope's nearest provider.
    pub fn use_runtime(&self) -> RuntimeAccessor {
        use_context::<ScopeSlots>()
            .and_then(|ScopeSlots(slots)| slots.get(&self.slot).cloned())
            .map(RuntimeAccessor::provided)
            .unwrap_or_else(RuntimeAccessor::missing)
    }

    /// Hooks bound to this scope's runtime.
    pub fn queries(&self) -> EffectQueries {
        EffectQueries::new(self.use_runtime())
    }

    /// [`EffectQueries::use_query`] on this scope's runtime.
    pub fn use_effect_query<Eff>(
        &self,
        options: impl Fn() -> EffectQueryOptions<Eff> + 'static,
    ) -> EffectQuery<Eff::Output, Eff::Error>
    where
        Eff: Effect<Env = Context> + 'static,
        Eff::Output: CacheValue,
        Eff::Error: CacheValue,
    {
        self.queries().use_query(options)
    }

    /// [`EffectQueries::use_mutation`] on this scope's runtime.
    pub fn use_effect_mutation<V, Eff, C>(
        &self,
        options: impl Fn() -> EffectMutationOptions<V, Eff, C> + 'static,
    ) -> EffectMutation<V, Eff::Output, Eff::Error>
    where
        V: Clone + 'static,
        Eff: Effect<Env = Context> + 'static,
        Eff::Output: Clone + fmt::Debug + 'static,
        Eff::Error: Clone + fmt::Debug + 'static,
        C: Clone + Send + 'static,
    {
        self.queries().use_mutation(options)
    }

    /// [`EffectQueries::use_infinite_query`] on this scope's runtime.
    pub fn use_effect_infinite_query<Eff, P>(
        &self,
        options: impl Fn() -> EffectInfiniteQueryOptions<Eff, P> + 'static,
    ) -> EffectInfiniteQuery<Eff::Output, Eff::Error, P>
    where
        Eff: Effect<Env = Context> + 'static,
        Eff::Output: CacheValue,
        Eff::Error: CacheValue,
        P: CacheValue,
    {
        self.queries().use_infinite_query(options)
    }
}

async fn release_after_fetches(provided: &ProvidedRuntime, runtime: Runtime) {
    let tasks = provided.tasks();
    tasks.close();
    tasks.wait().await;
    runtime.dispose().await;
}

async fn build_runtime<LE>(layer: Layer<LE>, provided: ProvidedRuntime, torn_down: Rc<Cell<bool>>)
where
    LE: fmt::Display + Send + 'static,
{
    match Runtime::from_layer(&layer).await {
        Ok(runtime) if torn_down.get() => {
            tracing::debug!(
                runtime = runtime.id(),
                "runtime ready after its provider was torn down, disposing"
            );
            runtime.dispose().await;
        }
        Ok(runtime) => provided.set(RuntimeStatus::Ready(runtime)),
        Err(cause) => {
            if !torn_down.get() {
                provided.set(RuntimeStatus::Failed(Defect::Construction(cause.to_string())));
            }
        }
    }
}
