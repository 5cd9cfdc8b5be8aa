//! Observing effect-bodied queries through the [`leptos_query`] cache.
//!
//! The cache only sees a key function and a fetcher. Everything else the
//! options carry (enablement, error escalation, the effect to run) stays
//! on this side and is read by the fetcher when the cache calls it.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use leptos_query::{use_query, QueryOptions, QueryState};
use leptos_reactive::{
    create_isomorphic_effect, on_cleanup, untrack, RwSignal, Signal, SignalGet, SignalUpdate,
    SignalWith, SignalWithUntracked,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::bridge::accessor::RuntimeAccessor;
use crate::bridge::boundary::{escalate, ErrorBoundary, ThrownError};
use crate::bridge::hooks::QuerySettings;
use crate::effect::cause::{Cause, Defect};
use crate::query::QueryKey;
use crate::runtime::{QueryError, Runtime};

/// Values the query cache can hold.
///
/// The cache serializes values to move them between server and client, so
/// besides being cloneable every cached value is serde-serializable.
pub trait CacheValue: Clone + fmt::Debug + Serialize + DeserializeOwned + 'static {}

impl<T> CacheValue for T where T: Clone + fmt::Debug + Serialize + DeserializeOwned + 'static {}

/// What a bridged query caches: the effect's output or its error.
pub type QueryOutcome<T, E> = Result<T, QueryError<E>>;

/// Handed to a query function for each fetch.
#[derive(Debug, Clone)]
pub struct QueryFnContext {
    /// Key being fetched.
    pub key: QueryKey,
    /// Cancelled when the observing owner is torn down.
    pub signal: CancellationToken,
}

/// Coarse state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing cached yet.
    Pending,
    /// The cached outcome is an error.
    Error,
    /// The cached outcome is data.
    Success,
}

pub(crate) type FetchFn<T, E> =
    Rc<dyn Fn(QueryFnContext, Runtime) -> LocalBoxFuture<'static, QueryOutcome<T, E>>>;

/// Options with the effect already erased into a fetch function.
pub(crate) struct PreparedQuery<T, E> {
    pub(crate) key: QueryKey,
    pub(crate) fetch: FetchFn<T, E>,
    pub(crate) settings: QuerySettings<E>,
    /// Replaces the hook's accessor for fetches of these options.
    pub(crate) accessor: Option<RuntimeAccessor>,
}

impl<T, E> Clone for PreparedQuery<T, E> {
    fn clone(&self) -> Self {
        PreparedQuery {
            key: self.key.clone(),
            fetch: self.fetch.clone(),
            settings: self.settings.clone(),
            accessor: self.accessor.clone(),
        }
    }
}

fn died<E>(defect: Defect) -> QueryError<E> {
    QueryError::Cause(Cause::Die(defect))
}

/// Decrements the count of gated fetches when the fetch passes its gates
/// or is dropped.
struct Gated(RwSignal<usize>);

impl Gated {
    fn enter(count: RwSignal<usize>) -> Self {
        count.try_update(|n| *n += 1);
        Gated(count)
    }
}

impl Drop for Gated {
    fn drop(&mut self) {
        self.0.try_update(|n| *n = n.saturating_sub(1));
    }
}

/// Observe the query described by `options` on `accessor`'s runtime.
///
/// Fetches wait until the query is enabled and the runtime has left
/// [`Pending`](crate::bridge::RuntimeStatus::Pending). The stale time is
/// read once, from the first options.
pub(crate) fn observe<T, E>(
    accessor: &RuntimeAccessor,
    options: impl Fn() -> PreparedQuery<T, E> + 'static,
) -> EffectQuery<T, E>
where
    T: CacheValue,
    E: CacheValue,
{
    let hook_token = CancellationToken::new();
    let token = hook_token.clone();
    on_cleanup({
        let hook_token = hook_token.clone();
        move || hook_token.cancel()
    });

    let initial = untrack(&options);
    let stale_time = initial.settings.stale_time;
    let (enabled, _) = watch::channel(initial.settings.enabled);
    let enabled = Rc::new(enabled);
    let latest = Rc::new(RefCell::new(initial));
    let gated = RwSignal::new(0usize);

    let key_fn = {
        let latest = latest.clone();
        let enabled = enabled.clone();
        move || {
            let prepared = options();
            let key = prepared.key.clone();
            enabled.send_replace(prepared.settings.enabled);
            *latest.borrow_mut() = prepared;
            key
        }
    };

    let fetcher = {
        let latest = latest.clone();
        let accessor = accessor.clone();
        move |key: QueryKey| {
            let prepared = Some(latest.borrow().clone()).filter(|p| p.key == key);
            let mut enabled = enabled.subscribe();
            let accessor = prepared
                .as_ref()
                .and_then(|p| p.accessor.clone())
                .unwrap_or_else(|| accessor.clone());
            let tracking = accessor.clone();
            let signal = hook_token.child_token();
            let gate = Gated::enter(gated);
            let fetch = async move {
                let Some(prepared) = prepared else {
                    return Err(died(Defect::message(format!(
                        "query {} is no longer observed",
                        key
                    ))));
                };
                let runtime = tokio::select! {
                    _ = signal.cancelled() => return Err(QueryError::Cause(Cause::Interrupt)),
                    runtime = async {
                        let _ = enabled.wait_for(|on| *on).await;
                        accessor.ready().await
                    } => runtime,
                };
                drop(gate);
                let runtime = runtime.map_err(died)?;
                tracing::debug!(key = %key, runtime = runtime.id(), "fetching query");
                (prepared.fetch)(QueryFnContext { key, signal }, runtime).await
            };
            tracking.track(fetch)
        }
    };

    let mut cache_options = QueryOptions::default();
    cache_options.stale_time = stale_time.or(cache_options.stale_time);
    let result = use_query(key_fn, fetcher, cache_options);

    let (settles, _) = watch::channel(0u64);
    let settles = Rc::new(settles);
    let boundary = ErrorBoundary::current();
    create_isomorphic_effect({
        let state = result.state;
        let settles = settles.clone();
        let latest = latest.clone();
        move |_| {
            state.with(|state| {
                if let QueryState::Loaded(data) = state {
                    if let Err(error) = &data.data {
                        throw_if_matching(&latest.borrow(), boundary, error);
                    }
                }
            });
            settles.send_modify(|n| *n = n.wrapping_add(1));
        }
    });

    let refetch = result.refetch;
    EffectQuery {
        state: result.state,
        is_fetching: result.is_fetching,
        gated,
        refetch: Rc::new(move || refetch()),
        latest,
        settles,
        token,
    }
}

fn throw_if_matching<T, E: fmt::Debug>(
    prepared: &PreparedQuery<T, E>,
    boundary: Option<ErrorBoundary>,
    error: &QueryError<E>,
) {
    let throws = prepared
        .settings
        .throw_on_error
        .as_ref()
        .is_some_and(|predicate| predicate(error));
    if throws {
        escalate(
            boundary,
            ThrownError::new(prepared.key.to_string(), format!("{:?}", error)),
        );
    }
}

/// A query whose body is an effect, as observed by one owner.
///
/// Accessors are tracked: reading them inside a reactive computation
/// re-runs it when the query changes.
pub struct EffectQuery<T: 'static, E: 'static> {
    state: Signal<QueryState<QueryOutcome<T, E>>>,
    is_fetching: Signal<bool>,
    gated: RwSignal<usize>,
    refetch: Rc<dyn Fn()>,
    latest: Rc<RefCell<PreparedQuery<T, E>>>,
    settles: Rc<watch::Sender<u64>>,
    token: CancellationToken,
}

impl<T, E> Clone for EffectQuery<T, E> {
    fn clone(&self) -> Self {
        EffectQuery {
            state: self.state,
            is_fetching: self.is_fetching,
            gated: self.gated,
            refetch: self.refetch.clone(),
            latest: self.latest.clone(),
            settles: self.settles.clone(),
            token: self.token.clone(),
        }
    }
}

impl<T, E> fmt::Debug for EffectQuery<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectQuery")
            .field("key", &self.latest.borrow().key)
            .finish_non_exhaustive()
    }
}

impl<T: CacheValue, E: CacheValue> EffectQuery<T, E> {
    /// Full cache state, tracked.
    pub fn state(&self) -> QueryState<QueryOutcome<T, E>> {
        self.state.get()
    }

    /// Cached outcome, if any.
    pub fn outcome(&self) -> Option<QueryOutcome<T, E>> {
        self.state.with(|state| state.data().cloned())
    }

    /// Cached data.
    pub fn data(&self) -> Option<T> {
        self.outcome().and_then(Result::ok)
    }

    /// Cached error.
    pub fn error(&self) -> Option<QueryError<E>> {
        self.outcome().and_then(Result::err)
    }

    /// Pending, error or success.
    pub fn status(&self) -> QueryStatus {
        self.state.with(|state| match state.data() {
            None => QueryStatus::Pending,
            Some(Ok(_)) => QueryStatus::Success,
            Some(Err(_)) => QueryStatus::Error,
        })
    }

    /// Nothing cached yet.
    pub fn is_pending(&self) -> bool {
        self.status() == QueryStatus::Pending
    }

    /// Data is cached.
    pub fn is_success(&self) -> bool {
        self.status() == QueryStatus::Success
    }

    /// An error is cached.
    pub fn is_error(&self) -> bool {
        self.status() == QueryStatus::Error
    }

    /// An effect is running for this query.
    ///
    /// A fetch still waiting for its runtime, or for the query to be
    /// enabled, does not count.
    pub fn is_fetching(&self) -> bool {
        self.is_fetching.get() && self.gated.try_get().unwrap_or(0) == 0
    }

    /// Fetch again, whether or not the data is stale.
    pub fn refetch(&self) {
        (self.refetch)()
    }

    /// Key of the latest options.
    pub fn key(&self) -> QueryKey {
        self.latest.borrow().key.clone()
    }

    /// Wait until an outcome is cached and no fetch is running.
    pub async fn settled(&self) {
        let mut changes = self.settles.subscribe();
        while !self.is_settled() {
            if changes.changed().await.is_err() {
                return;
            }
        }
    }

    /// Cached outcome, untracked.
    pub(crate) fn outcome_untracked(&self) -> Option<QueryOutcome<T, E>> {
        self.state
            .try_with_untracked(|state| state.data().cloned())
            .flatten()
    }

    /// A signal cancelled when the observing owner is torn down.
    pub(crate) fn signal(&self) -> CancellationToken {
        self.token.child_token()
    }

    fn is_settled(&self) -> bool {
        self.state
            .try_with_untracked(|state| {
                matches!(state, QueryState::Loaded(_) | QueryState::Invalid(_))
            })
            .unwrap_or(true)
    }
}
