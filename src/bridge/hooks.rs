//! Queries and mutations whose bodies are effects.
//!
//! The options types here carry a cache key, an effect-returning function
//! and policy settings. [`EffectQueries`] erases the effect into a fetch
//! function that runs it with
//! [`run_promise_unwrapped`](crate::runtime::run_promise_unwrapped) on the
//! runtime its [`RuntimeAccessor`] resolves when the fetch starts, and
//! hands that to the [`leptos_query`] cache.

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use futures::future::FutureExt;

use crate::bridge::accessor::RuntimeAccessor;
use crate::bridge::boundary::{escalate, ErrorBoundary, ThrownError};
use crate::bridge::infinite::{
    observe_infinite, EffectInfiniteQuery, PageContext, PageParamFn, PreparedInfinite,
};
use crate::bridge::mutation::{EffectMutation, PreparedMutation};
use crate::bridge::query::{observe, CacheValue, EffectQuery, PreparedQuery, QueryFnContext};
use crate::context::Context;
use crate::effect::boxed::BoxedEffect;
use crate::effect::trait_def::Effect;
use crate::query::QueryKey;
use crate::runtime::{run_promise_exit, run_promise_unwrapped, QueryError, RunOptions, Runtime};

type ErrorPredicate<E> = Rc<dyn Fn(&QueryError<E>) -> bool>;

/// Policy shared by every kind of bridged query.
pub struct QuerySettings<E> {
    pub(crate) enabled: bool,
    pub(crate) stale_time: Option<Duration>,
    pub(crate) throw_on_defect: bool,
    pub(crate) throw_on_error: Option<ErrorPredicate<E>>,
}

impl<E> Clone for QuerySettings<E> {
    fn clone(&self) -> Self {
        QuerySettings {
            enabled: self.enabled,
            stale_time: self.stale_time,
            throw_on_defect: self.throw_on_defect,
            throw_on_error: self.throw_on_error.clone(),
        }
    }
}

impl<E> fmt::Debug for QuerySettings<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuerySettings")
            .field("enabled", &self.enabled)
            .field("stale_time", &self.stale_time)
            .field("throw_on_defect", &self.throw_on_defect)
            .field("throw_on_error", &self.throw_on_error.is_some())
            .finish()
    }
}

impl<E> Default for QuerySettings<E> {
    fn default() -> Self {
        QuerySettings {
            enabled: true,
            stale_time: None,
            throw_on_defect: false,
            throw_on_error: None,
        }
    }
}

impl<E> QuerySettings<E> {
    /// Enabled, client default stale time, failures reported as causes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the query may fetch automatically.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// How long fetched data counts as fresh.
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    /// Report a lone expected failure as [`QueryError::Failure`] instead of
    /// a cause.
    pub fn throw_on_defect(mut self, throw_on_defect: bool) -> Self {
        self.throw_on_defect = throw_on_defect;
        self
    }

    /// Escalate errors matching `predicate` to the nearest error boundary.
    pub fn throw_on_error(mut self, predicate: impl Fn(&QueryError<E>) -> bool + 'static) -> Self {
        self.throw_on_error = Some(Rc::new(predicate));
        self
    }
}

/// A query whose body is an effect.
pub struct EffectQueryOptions<Eff: Effect> {
    key: QueryKey,
    query_fn: Rc<dyn Fn(&QueryFnContext) -> Eff>,
    settings: QuerySettings<Eff::Error>,
}

impl<Eff: Effect> fmt::Debug for EffectQueryOptions<Eff> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectQueryOptions")
            .field("key", &self.key)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<Eff: Effect + 'static> EffectQueryOptions<Eff> {
    /// Options for `key`, fetched by running `query_fn(ctx)`.
    pub fn new(key: QueryKey, query_fn: impl Fn(&QueryFnContext) -> Eff + 'static) -> Self {
        EffectQueryOptions {
            key,
            query_fn: Rc::new(query_fn),
            settings: QuerySettings::default(),
        }
    }

    /// Replace every policy setting at once.
    pub fn settings(mut self, settings: QuerySettings<Eff::Error>) -> Self {
        self.settings = settings;
        self
    }

    /// See [`QuerySettings::enabled`].
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.settings = self.settings.enabled(enabled);
        self
    }

    /// See [`QuerySettings::stale_time`].
    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.settings = self.settings.stale_time(stale_time);
        self
    }

    /// See [`QuerySettings::throw_on_defect`].
    pub fn throw_on_defect(mut self, throw_on_defect: bool) -> Self {
        self.settings = self.settings.throw_on_defect(throw_on_defect);
        self
    }

    /// See [`QuerySettings::throw_on_error`].
    pub fn throw_on_error(
        mut self,
        predicate: impl Fn(&QueryError<Eff::Error>) -> bool + 'static,
    ) -> Self {
        self.settings = self.settings.throw_on_error(predicate);
        self
    }

    /// The cache key.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }
}

/// Erase the effect of `options` into a fetch function.
pub(crate) fn prepare_query<Eff>(
    options: EffectQueryOptions<Eff>,
) -> PreparedQuery<Eff::Output, Eff::Error>
where
    Eff: Effect<Env = Context> + 'static,
{
    let EffectQueryOptions {
        key,
        query_fn,
        settings,
    } = options;
    let throw_on_defect = settings.throw_on_defect;
    PreparedQuery {
        key,
        fetch: Rc::new(move |ctx: QueryFnContext, runtime: Runtime| {
            let effect = query_fn(&ctx);
            let options = RunOptions::with_signal(ctx.signal);
            async move { run_promise_unwrapped(&runtime, effect, options, throw_on_defect).await }
                .boxed_local()
        }),
        settings,
        accessor: None,
    }
}

/// A paginated query whose pages are fetched by effects.
pub struct EffectInfiniteQueryOptions<Eff: Effect, P> {
    key: QueryKey,
    query_fn: Rc<dyn Fn(&PageContext<P>) -> Eff>,
    initial_page_param: P,
    get_next_page_param: PageParamFn<Eff::Output, P>,
    get_previous_page_param: Option<PageParamFn<Eff::Output, P>>,
    settings: QuerySettings<Eff::Error>,
}

impl<Eff: Effect, P: fmt::Debug> fmt::Debug for EffectInfiniteQueryOptions<Eff, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectInfiniteQueryOptions")
            .field("key", &self.key)
            .field("initial_page_param", &self.initial_page_param)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<Eff: Effect + 'static, P: 'static> EffectInfiniteQueryOptions<Eff, P> {
    /// Options for `key`; each page is fetched by running `query_fn(ctx)`.
    pub fn new<N>(
        key: QueryKey,
        query_fn: impl Fn(&PageContext<P>) -> Eff + 'static,
        initial_page_param: P,
        get_next_page_param: N,
    ) -> Self
    where
        N: Fn(&Eff::Output, &[Eff::Output], &P, &[P]) -> Option<P> + 'static,
    {
        EffectInfiniteQueryOptions {
            key,
            query_fn: Rc::new(query_fn),
            initial_page_param,
            get_next_page_param: Rc::new(get_next_page_param),
            get_previous_page_param: None,
            settings: QuerySettings::default(),
        }
    }

    /// Enable backward pagination.
    pub fn get_previous_page_param(
        mut self,
        f: impl Fn(&Eff::Output, &[Eff::Output], &P, &[P]) -> Option<P> + 'static,
    ) -> Self {
        self.get_previous_page_param = Some(Rc::new(f));
        self
    }

    /// Replace every policy setting at once.
    pub fn settings(mut self, settings: QuerySettings<Eff::Error>) -> Self {
        self.settings = settings;
        self
    }

    /// See [`QuerySettings::enabled`].
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.settings = self.settings.enabled(enabled);
        self
    }

    /// See [`QuerySettings::throw_on_defect`].
    pub fn throw_on_defect(mut self, throw_on_defect: bool) -> Self {
        self.settings = self.settings.throw_on_defect(throw_on_defect);
        self
    }
}

pub(crate) fn prepare_infinite<Eff, P>(
    options: EffectInfiniteQueryOptions<Eff, P>,
) -> PreparedInfinite<Eff::Output, Eff::Error, P>
where
    Eff: Effect<Env = Context> + 'static,
    P: 'static,
{
    let EffectInfiniteQueryOptions {
        key,
        query_fn,
        initial_page_param,
        get_next_page_param,
        get_previous_page_param,
        settings,
    } = options;
    let throw_on_defect = settings.throw_on_defect;
    PreparedInfinite {
        key,
        fetch_page: Rc::new(move |ctx: PageContext<P>, runtime: Runtime| {
            let effect = query_fn(&ctx);
            let options = RunOptions::with_signal(ctx.signal);
            async move { run_promise_unwrapped(&runtime, effect, options, throw_on_defect).await }
                .boxed_local()
        }),
        initial_page_param,
        next_page_param: get_next_page_param,
        previous_page_param: get_previous_page_param,
        settings,
    }
}

type Callback<A, R, E> = Rc<dyn Fn(A) -> BoxedEffect<R, E, Context>>;
type SuccessCallback<V, T, E, C> = Rc<dyn Fn(T, V, Option<C>) -> BoxedEffect<(), E, Context>>;
type ErrorCallback<V, E, C> =
    Rc<dyn Fn(QueryError<E>, V, Option<C>) -> BoxedEffect<(), E, Context>>;
type SettledCallback<V, T, E, C> =
    Rc<dyn Fn(Option<T>, Option<QueryError<E>>, V, Option<C>) -> BoxedEffect<(), E, Context>>;

/// Error translation and lifecycle callbacks of a bridged mutation.
///
/// Callbacks are effects run on the mutation's runtime, in the order
/// `on_mutate`, then `on_success` or `on_error`, then `on_settled`. A
/// callback that fails does not change the mutation's outcome: its cause
/// becomes a [`Defect::Callback`](crate::effect::Defect::Callback) thrown
/// to the nearest [`ErrorBoundary`](crate::bridge::ErrorBoundary).
pub struct MutationSettings<V, T, E, C = ()> {
    throw_on_defect: bool,
    on_mutate: Option<Callback<V, C, E>>,
    on_success: Option<SuccessCallback<V, T, E, C>>,
    on_error: Option<ErrorCallback<V, E, C>>,
    on_settled: Option<SettledCallback<V, T, E, C>>,
}

impl<V, T, E, C> Clone for MutationSettings<V, T, E, C> {
    fn clone(&self) -> Self {
        MutationSettings {
            throw_on_defect: self.throw_on_defect,
            on_mutate: self.on_mutate.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            on_settled: self.on_settled.clone(),
        }
    }
}

impl<V, T, E, C> Default for MutationSettings<V, T, E, C> {
    fn default() -> Self {
        MutationSettings {
            throw_on_defect: false,
            on_mutate: None,
            on_success: None,
            on_error: None,
            on_settled: None,
        }
    }
}

impl<V, T, E, C> fmt::Debug for MutationSettings<V, T, E, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationSettings")
            .field("throw_on_defect", &self.throw_on_defect)
            .field("on_mutate", &self.on_mutate.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_settled", &self.on_settled.is_some())
            .finish()
    }
}

impl<V, T, E, C> MutationSettings<V, T, E, C>
where
    V: 'static,
    T: Send + 'static,
    E: Send + 'static,
    C: Send + 'static,
{
    /// No callbacks; failures reported as causes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a lone expected failure as [`QueryError::Failure`].
    pub fn throw_on_defect(mut self, throw_on_defect: bool) -> Self {
        self.throw_on_defect = throw_on_defect;
        self
    }

    /// Runs before the mutation; its output is handed to later callbacks.
    ///
    /// If it fails, the later callbacks receive `None`.
    pub fn on_mutate<F, Eff>(mut self, f: F) -> Self
    where
        F: Fn(V) -> Eff + 'static,
        Eff: Effect<Output = C, Error = E, Env = Context> + 'static,
    {
        self.on_mutate = Some(Rc::new(move |vars| BoxedEffect::new(f(vars))));
        self
    }

    /// Runs after the mutation succeeded.
    pub fn on_success<F, Eff>(mut self, f: F) -> Self
    where
        F: Fn(T, V, Option<C>) -> Eff + 'static,
        Eff: Effect<Output = (), Error = E, Env = Context> + 'static,
    {
        self.on_success = Some(Rc::new(move |data, vars, ctx| {
            BoxedEffect::new(f(data, vars, ctx))
        }));
        self
    }

    /// Runs after any failure.
    pub fn on_error<F, Eff>(mut self, f: F) -> Self
    where
        F: Fn(QueryError<E>, V, Option<C>) -> Eff + 'static,
        Eff: Effect<Output = (), Error = E, Env = Context> + 'static,
    {
        self.on_error = Some(Rc::new(move |error, vars, ctx| {
            BoxedEffect::new(f(error, vars, ctx))
        }));
        self
    }

    /// Runs last on every outcome.
    pub fn on_settled<F, Eff>(mut self, f: F) -> Self
    where
        F: Fn(Option<T>, Option<QueryError<E>>, V, Option<C>) -> Eff + 'static,
        Eff: Effect<Output = (), Error = E, Env = Context> + 'static,
    {
        self.on_settled = Some(Rc::new(move |data, error, vars, ctx| {
            BoxedEffect::new(f(data, error, vars, ctx))
        }));
        self
    }
}

/// A mutation whose body is an effect.
pub struct EffectMutationOptions<V, Eff: Effect, C = ()> {
    key: Option<QueryKey>,
    mutation_fn: Rc<dyn Fn(V) -> Eff>,
    settings: MutationSettings<V, Eff::Output, Eff::Error, C>,
}

impl<V, Eff: Effect, C> fmt::Debug for EffectMutationOptions<V, Eff, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectMutationOptions")
            .field("key", &self.key)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<V, Eff, C> EffectMutationOptions<V, Eff, C>
where
    V: 'static,
    Eff: Effect + 'static,
    C: Send + 'static,
{
    /// Options running `mutation_fn(vars)` for every mutation.
    pub fn new(mutation_fn: impl Fn(V) -> Eff + 'static) -> Self {
        EffectMutationOptions {
            key: None,
            mutation_fn: Rc::new(mutation_fn),
            settings: MutationSettings::default(),
        }
    }

    /// Identify the mutation.
    pub fn key(mut self, key: QueryKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Replace error translation and callbacks at once.
    pub fn settings(mut self, settings: MutationSettings<V, Eff::Output, Eff::Error, C>) -> Self {
        self.settings = settings;
        self
    }

    /// See [`MutationSettings::throw_on_defect`].
    pub fn throw_on_defect(mut self, throw_on_defect: bool) -> Self {
        self.settings = self.settings.throw_on_defect(throw_on_defect);
        self
    }

    /// See [`MutationSettings::on_mutate`].
    pub fn on_mutate<F, CEff>(mut self, f: F) -> Self
    where
        F: Fn(V) -> CEff + 'static,
        CEff: Effect<Output = C, Error = Eff::Error, Env = Context> + 'static,
    {
        self.settings = self.settings.on_mutate(f);
        self
    }

    /// See [`MutationSettings::on_success`].
    pub fn on_success<F, CEff>(mut self, f: F) -> Self
    where
        F: Fn(Eff::Output, V, Option<C>) -> CEff + 'static,
        CEff: Effect<Output = (), Error = Eff::Error, Env = Context> + 'static,
    {
        self.settings = self.settings.on_success(f);
        self
    }

    /// See [`MutationSettings::on_error`].
    pub fn on_error<F, CEff>(mut self, f: F) -> Self
    where
        F: Fn(QueryError<Eff::Error>, V, Option<C>) -> CEff + 'static,
        CEff: Effect<Output = (), Error = Eff::Error, Env = Context> + 'static,
    {
        self.settings = self.settings.on_error(f);
        self
    }

    /// See [`MutationSettings::on_settled`].
    pub fn on_settled<F, CEff>(mut self, f: F) -> Self
    where
        F: Fn(Option<Eff::Output>, Option<QueryError<Eff::Error>>, V, Option<C>) -> CEff + 'static,
        CEff: Effect<Output = (), Error = Eff::Error, Env = Context> + 'static,
    {
        self.settings = self.settings.on_settled(f);
        self
    }
}

/// Run a lifecycle callback. A failure is logged and thrown to `boundary`;
/// the caller carries on with `None`.
async fn run_callback<R, E>(
    runtime: &Runtime,
    hook: &'static str,
    effect: BoxedEffect<R, E, Context>,
    boundary: Option<ErrorBoundary>,
) -> Option<R>
where
    R: Send + 'static,
    E: fmt::Debug + Send + 'static,
{
    match runtime.run(effect).await {
        Ok(value) => Some(value),
        Err(cause) => {
            let defect = cause.into_defect(hook);
            tracing::warn!(hook, error = %defect, "mutation callback failed");
            escalate(boundary, ThrownError::new(hook, defect.to_string()));
            None
        }
    }
}

/// Erase the body and callbacks of `options` into one run function.
///
/// The run resolves to the body's own exit whatever the callbacks do.
pub(crate) fn prepare_mutation<V, Eff, C>(
    options: EffectMutationOptions<V, Eff, C>,
) -> PreparedMutation<V, Eff::Output, Eff::Error>
where
    V: Clone + 'static,
    Eff: Effect<Env = Context> + 'static,
    Eff::Output: Clone,
    Eff::Error: Clone + fmt::Debug,
    C: Clone + Send + 'static,
{
    let EffectMutationOptions {
        key,
        mutation_fn,
        settings,
    } = options;
    let MutationSettings {
        throw_on_defect,
        on_mutate,
        on_success,
        on_error,
        on_settled,
    } = settings;

    let run = move |vars: V, runtime: Runtime, boundary: Option<ErrorBoundary>| {
        let effect = mutation_fn(vars.clone());
        let on_mutate = on_mutate.clone();
        let on_success = on_success.clone();
        let on_error = on_error.clone();
        let on_settled = on_settled.clone();
        async move {
            let mut context = None;
            if let Some(f) = on_mutate {
                context = run_callback(&runtime, "on_mutate", f(vars.clone()), boundary).await;
            }

            let exit = run_promise_exit(&runtime, effect, RunOptions::new()).await;
            let outcome = exit
                .clone()
                .into_result()
                .map_err(|cause| QueryError::from_cause(cause, throw_on_defect));

            match (&outcome, on_success, on_error) {
                (Ok(data), Some(f), _) => {
                    let callback = f(data.clone(), vars.clone(), context.clone());
                    run_callback(&runtime, "on_success", callback, boundary).await;
                }
                (Err(error), _, Some(f)) => {
                    let callback = f(error.clone(), vars.clone(), context.clone());
                    run_callback(&runtime, "on_error", callback, boundary).await;
                }
                _ => {}
            }
            if let Some(f) = on_settled {
                let (data, error) = match outcome {
                    Ok(data) => (Some(data), None),
                    Err(error) => (None, Some(error)),
                };
                let callback = f(data, error, vars, context);
                run_callback(&runtime, "on_settled", callback, boundary).await;
            }
            exit
        }
        .boxed_local()
    };

    PreparedMutation {
        key,
        run: Rc::new(run),
        throw_on_defect,
        accessor: None,
    }
}

/// Query and mutation hooks bound to one runtime accessor.
///
/// Every hook caches through the [`QueryClient`](crate::query::QueryClient)
/// provided above the current owner, and panics without one.
#[derive(Debug, Clone)]
pub struct EffectQueries {
    accessor: RuntimeAccessor,
}

/// Bind query hooks to `accessor`.
pub fn make_query_hook(accessor: RuntimeAccessor) -> EffectQueries {
    EffectQueries::new(accessor)
}

impl EffectQueries {
    /// Hooks running effects on whatever `accessor` resolves to.
    pub fn new(accessor: RuntimeAccessor) -> Self {
        EffectQueries { accessor }
    }

    /// The accessor the hooks resolve runtimes from.
    pub fn accessor(&self) -> &RuntimeAccessor {
        &self.accessor
    }

    /// Observe a query whose body is an effect.
    ///
    /// `options` is re-read whenever a signal it reads changes; a new key
    /// means a new cache entry. Fetches wait while the runtime is being
    /// built. If it failed to build, every fetch fails with the
    /// construction defect.
    pub fn use_query<Eff>(
        &self,
        options: impl Fn() -> EffectQueryOptions<Eff> + 'static,
    ) -> EffectQuery<Eff::Output, Eff::Error>
    where
        Eff: Effect<Env = Context> + 'static,
        Eff::Output: CacheValue,
        Eff::Error: CacheValue,
    {
        observe(&self.accessor, move || prepare_query(options()))
    }

    /// Create a mutation whose body and callbacks are effects.
    ///
    /// `options` is read once per call of `mutate`.
    pub fn use_mutation<V, Eff, C>(
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
        EffectMutation::new(self.accessor.clone(), move || prepare_mutation(options()))
    }

    /// Observe a paginated query whose pages are fetched by effects.
    pub fn use_infinite_query<Eff, P>(
        &self,
        options: impl Fn() -> EffectInfiniteQueryOptions<Eff, P> + 'static,
    ) -> EffectInfiniteQuery<Eff::Output, Eff::Error, P>
    where
        Eff: Effect<Env = Context> + 'static,
        Eff::Output: CacheValue,
        Eff::Error: CacheValue,
        P: CacheValue,
    {
        observe_infinite(&self.accessor, move || prepare_infinite(options()))
    }
}
