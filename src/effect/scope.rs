//! Finalizer scopes.
//!
//! A [`Scope`] collects release actions and runs them, last-added first, when
//! it is closed. Closing is idempotent: the second and later calls find no
//! finalizers left and return immediately.
//!
//! Scopes back three things in this crate:
//! - a [`Runtime`](crate::runtime::Runtime)'s layer resources
//! - the pending interruption handlers of a running fiber
//! - per-call resources opened with [`scoped`]

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use parking_lot::Mutex;

use crate::effect::boxed::BoxFuture;
use crate::effect::cause::Cause;
use crate::effect::fiber::FinalizerGuard;
use crate::effect::trait_def::Effect;

/// A deferred release action.
pub type Finalizer = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

#[derive(Default)]
struct ScopeState {
    finalizers: Vec<Finalizer>,
    closed: bool,
}

/// A bag of finalizers closed exactly once.
///
/// Cloning a `Scope` yields another handle to the same finalizers.
#[derive(Clone, Default)]
pub struct Scope {
    state: Arc<Mutex<ScopeState>>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Scope")
            .field("finalizers", &state.finalizers.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl Scope {
    /// Create an open, empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release action.
    ///
    /// Returns `false` if the scope is already closed; the action is dropped
    /// without running.
    pub fn add_finalizer<F, Fut>(&self, f: F) -> bool
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_boxed(Box::new(move || -> BoxFuture<'static, ()> { Box::pin(f()) }))
            .is_ok()
    }

    pub(crate) fn add_boxed(&self, finalizer: Finalizer) -> Result<(), Finalizer> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(finalizer);
        }
        state.finalizers.push(finalizer);
        Ok(())
    }

    /// Whether [`close`](Scope::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of finalizers waiting to run.
    pub fn len(&self) -> usize {
        self.state.lock().finalizers.len()
    }

    /// Whether no finalizers are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every registered finalizer in LIFO order.
    ///
    /// A panicking finalizer is logged and does not stop the others.
    pub async fn close(&self) {
        let finalizers = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.finalizers)
        };
        for finalizer in finalizers.into_iter().rev() {
            if AssertUnwindSafe(finalizer()).catch_unwind().await.is_err() {
                tracing::warn!("finalizer panicked while closing scope");
            }
        }
    }
}

/// Effect that runs with a fresh [`Scope`], closing it on every exit path.
///
/// Created by [`scoped`].
pub struct Scoped<F> {
    f: F,
}

impl<F> fmt::Debug for Scoped<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped").field("f", &"<function>").finish()
    }
}

impl<F, Eff> Effect for Scoped<F>
where
    F: FnOnce(&Scope) -> Eff + Send,
    Eff: Effect,
{
    type Output = Eff::Output;
    type Error = Eff::Error;
    type Env = Eff::Env;

    async fn run(self, env: &Self::Env) -> Result<Self::Output, Cause<Self::Error>> {
        let scope = Scope::new();
        let closing = scope.clone();
        let guard = FinalizerGuard::new(Box::new(move || -> BoxFuture<'static, ()> {
            Box::pin(async move { closing.close().await })
        }));
        let result = (self.f)(&scope).run(env).await;
        if let Some(close) = guard.disarm() {
            close().await;
        }
        result
    }
}

/// Run an effect with a scope that is closed when the effect finishes.
///
/// Resources registered on the scope are released after success, failure,
/// defect, or interruption.
///
/// # Example
///
/// ```rust,ignore
/// let effect = scoped(|scope| {
///     let stream = open_stream();
///     let closing = stream.clone();
///     scope.add_finalizer(move || async move { closing.close().await });
///     read_all(stream)
/// });
/// ```
pub fn scoped<F, Eff>(f: F) -> Scoped<F>
where
    F: FnOnce(&Scope) -> Eff + Send,
    Eff: Effect,
{
    Scoped { f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_close_runs_lifo_once() {
        let scope = Scope::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            scope.add_finalizer(move || async move { order.lock().push(i) });
        }

        scope.close().await;
        scope.close().await;

        assert_eq!(*order.lock(), vec![2, 1, 0]);
        assert!(scope.is_closed());
    }

    #[tokio::test]
    async fn test_add_after_close_is_rejected() {
        let scope = Scope::new();
        scope.close().await;
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        let added = scope.add_finalizer(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(!added);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_finalizer_does_not_stop_others() {
        let scope = Scope::new();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();
        scope.add_finalizer(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        scope.add_finalizer(|| async { panic!("release failed") });

        scope.close().await;
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
