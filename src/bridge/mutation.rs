//! Mutations whose bodies and callbacks are effects.
//!
//! The query cache has no notion of a mutation, so the mutation state is an
//! ordinary signal owned by the hook's owner. Only the latest call of
//! [`EffectMutation::mutate`] writes it.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use leptos_reactive::{spawn_local, untrack, RwSignal, SignalGet, SignalSet, SignalWith};

use crate::bridge::accessor::RuntimeAccessor;
use crate::bridge::boundary::ErrorBoundary;
use crate::effect::cause::Cause;
use crate::effect::exit::Exit;
use crate::query::QueryKey;
use crate::runtime::{QueryError, Runtime};

/// Coarse state of a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    /// Not run yet, or reset.
    Idle,
    /// Running.
    Pending,
    /// The last run succeeded.
    Success,
    /// The last run failed.
    Error,
}

/// State of a mutation, including the variables of its last run.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<V, T, E> {
    /// Not run yet, or reset.
    Idle,
    /// Running with `variables`.
    Pending {
        /// Variables of the running call.
        variables: V,
    },
    /// The last run succeeded.
    Success {
        /// Variables of the call.
        variables: V,
        /// What the body produced.
        data: T,
    },
    /// The last run failed.
    Error {
        /// Variables of the call.
        variables: V,
        /// The body's failure, translated like a query error.
        error: QueryError<E>,
    },
}

impl<V, T, E> MutationState<V, T, E> {
    /// Coarse status.
    pub fn status(&self) -> MutationStatus {
        match self {
            MutationState::Idle => MutationStatus::Idle,
            MutationState::Pending { .. } => MutationStatus::Pending,
            MutationState::Success { .. } => MutationStatus::Success,
            MutationState::Error { .. } => MutationStatus::Error,
        }
    }

    /// Variables of the last call, if any.
    pub fn variables(&self) -> Option<&V> {
        match self {
            MutationState::Idle => None,
            MutationState::Pending { variables }
            | MutationState::Success { variables, .. }
            | MutationState::Error { variables, .. } => Some(variables),
        }
    }
}

pub(crate) type RunFn<V, T, E> =
    Rc<dyn Fn(V, Runtime, Option<ErrorBoundary>) -> LocalBoxFuture<'static, Exit<T, E>>>;

/// Options with the body and every callback erased into one function.
pub(crate) struct PreparedMutation<V, T, E> {
    pub(crate) key: Option<QueryKey>,
    pub(crate) run: RunFn<V, T, E>,
    pub(crate) throw_on_defect: bool,
    /// Replaces the hook's accessor for runs of these options.
    pub(crate) accessor: Option<RuntimeAccessor>,
}

/// A mutation created through [`EffectQueries::use_mutation`](crate::bridge::EffectQueries::use_mutation).
pub struct EffectMutation<V: 'static, T: 'static, E: 'static> {
    state: RwSignal<MutationState<V, T, E>>,
    generation: Rc<Cell<u64>>,
    options: Rc<dyn Fn() -> PreparedMutation<V, T, E>>,
    accessor: RuntimeAccessor,
    boundary: Option<ErrorBoundary>,
}

impl<V, T, E> Clone for EffectMutation<V, T, E> {
    fn clone(&self) -> Self {
        EffectMutation {
            state: self.state,
            generation: self.generation.clone(),
            options: self.options.clone(),
            accessor: self.accessor.clone(),
            boundary: self.boundary,
        }
    }
}

impl<V, T, E> fmt::Debug for EffectMutation<V, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectMutation")
            .field("generation", &self.generation.get())
            .field("accessor", &self.accessor)
            .finish_non_exhaustive()
    }
}

impl<V, T, E> EffectMutation<V, T, E>
where
    V: Clone + 'static,
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub(crate) fn new(
        accessor: RuntimeAccessor,
        options: impl Fn() -> PreparedMutation<V, T, E> + 'static,
    ) -> Self {
        EffectMutation {
            state: RwSignal::new(MutationState::Idle),
            generation: Rc::new(Cell::new(0)),
            options: Rc::new(options),
            accessor,
            boundary: ErrorBoundary::current(),
        }
    }

    /// Run in the background; the outcome lands in the state.
    ///
    /// Must be called inside a [`LocalSet`](tokio::task::LocalSet).
    pub fn mutate(&self, vars: V) {
        let run = self.mutate_async(vars);
        spawn_local(async move {
            run.await;
        });
    }

    /// Run and return the exit of the mutation's body.
    ///
    /// Callbacks do not change the exit. One that fails is thrown to the
    /// nearest [`ErrorBoundary`] as a
    /// [`Defect::Callback`](crate::effect::Defect::Callback).
    pub fn mutate_async(&self, vars: V) -> impl Future<Output = Exit<T, E>> + 'static {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        let prepared = untrack(|| (self.options)());
        let _ = self.state.try_set(MutationState::Pending {
            variables: vars.clone(),
        });

        let state = self.state;
        let current = self.generation.clone();
        let boundary = self.boundary;
        let accessor = prepared
            .accessor
            .clone()
            .unwrap_or_else(|| self.accessor.clone());
        async move {
            let exit = match accessor.resolve() {
                Ok(runtime) => (prepared.run)(vars.clone(), runtime, boundary).await,
                Err(defect) => Exit::Failure(Cause::Die(defect)),
            };
            if current.get() == generation {
                let next = match &exit {
                    Exit::Success(data) => MutationState::Success {
                        variables: vars,
                        data: data.clone(),
                    },
                    Exit::Failure(cause) => MutationState::Error {
                        variables: vars,
                        error: QueryError::from_cause(cause.clone(), prepared.throw_on_defect),
                    },
                };
                let _ = state.try_set(next);
            }
            exit
        }
    }

    /// Forget the last outcome. A run still in flight no longer reports.
    pub fn reset(&self) {
        self.generation.set(self.generation.get() + 1);
        let _ = self.state.try_set(MutationState::Idle);
    }

    /// Key of the current options.
    pub fn key(&self) -> Option<QueryKey> {
        untrack(|| (self.options)()).key
    }

    /// Full state, tracked.
    pub fn state(&self) -> MutationState<V, T, E> {
        self.state.get()
    }

    /// Result of the last successful run, tracked.
    pub fn data(&self) -> Option<T> {
        self.state.with(|state| match state {
            MutationState::Success { data, .. } => Some(data.clone()),
            _ => None,
        })
    }

    /// Error of the last failed run, tracked.
    pub fn error(&self) -> Option<QueryError<E>> {
        self.state.with(|state| match state {
            MutationState::Error { error, .. } => Some(error.clone()),
            _ => None,
        })
    }

    /// Status, tracked.
    pub fn status(&self) -> MutationStatus {
        self.state.with(MutationState::status)
    }

    /// Not run yet, or reset.
    pub fn is_idle(&self) -> bool {
        self.status() == MutationStatus::Idle
    }

    /// Running.
    pub fn is_pending(&self) -> bool {
        self.status() == MutationStatus::Pending
    }

    /// The last run succeeded.
    pub fn is_success(&self) -> bool {
        self.status() == MutationStatus::Success
    }

    /// The last run failed.
    pub fn is_error(&self) -> bool {
        self.status() == MutationStatus::Error
    }
}
