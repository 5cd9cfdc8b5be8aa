//! Layers: recipes for building services.
//!
//! A [`Layer`] describes how to construct one or more services, including
//! any resources that must be released later. Layers are inert values;
//! [`Runtime::from_layer`](crate::runtime::Runtime::from_layer) builds one
//! and owns whatever it acquired until the runtime is disposed.
//!
//! # Example
//!
//! ```rust,ignore
//! use stillwater_query::prelude::*;
//!
//! let layer = Layer::<AppError>::succeed::<ConfigTag>(config)
//!     .provide_to(Layer::scoped::<PoolTag, _, _, _, _>(
//!         || service::<ConfigTag, AppError>().and_then(|cfg| open_pool(cfg)),
//!         |pool| from_async(move |_: &Context| async move { pool.close().await; Ok::<_, AppError>(()) }),
//!     ));
//!
//! let runtime = Runtime::from_layer(&layer).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use crate::context::{Context, Tag};
use crate::effect::boxed::BoxFuture;
use crate::effect::cause::Cause;
use crate::effect::fiber::execute;
use crate::effect::scope::Scope;
use crate::effect::trait_def::Effect;

type BuildFn<E> =
    dyn Fn(Context, Scope) -> BoxFuture<'static, Result<Context, Cause<E>>> + Send + Sync;

/// A recipe for constructing services, parameterized by its construction
/// error type.
pub struct Layer<E> {
    build: Arc<BuildFn<E>>,
}

impl<E> Clone for Layer<E> {
    fn clone(&self) -> Self {
        Layer {
            build: self.build.clone(),
        }
    }
}

impl<E> fmt::Debug for Layer<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer").field("build", &"<function>").finish()
    }
}

impl<E: Send + 'static> Layer<E> {
    fn from_build<F>(build: F) -> Self
    where
        F: Fn(Context, Scope) -> BoxFuture<'static, Result<Context, Cause<E>>>
            + Send
            + Sync
            + 'static,
    {
        Layer {
            build: Arc::new(build),
        }
    }

    /// A layer that provides nothing.
    pub fn empty() -> Self {
        Self::from_build(|_, _| Box::pin(async { Ok(Context::empty()) }))
    }

    /// A layer providing an already-built service.
    pub fn succeed<T: Tag>(service: T::Service) -> Self {
        Self::from_build(move |_, _| {
            let service = service.clone();
            Box::pin(async move { Ok(Context::empty().add::<T>(service)) })
        })
    }

    /// A layer whose service is produced by an effect.
    ///
    /// The effect runs against the layer's input context, so it can read
    /// services provided upstream (see [`provide_to`](Layer::provide_to)).
    pub fn effect<T, F, Eff>(make: F) -> Self
    where
        T: Tag,
        F: Fn() -> Eff + Send + Sync + 'static,
        Eff: Effect<Output = T::Service, Error = E, Env = Context> + 'static,
    {
        Self::from_build(move |input, _| {
            let effect = make();
            Box::pin(async move {
                let service = execute(effect, &input, None).await?;
                Ok(Context::empty().add::<T>(service))
            })
        })
    }

    /// A layer whose service is acquired by an effect and released when the
    /// owning runtime is disposed.
    pub fn scoped<T, F, Eff, R, RelEff>(acquire: F, release: R) -> Self
    where
        T: Tag,
        F: Fn() -> Eff + Send + Sync + 'static,
        Eff: Effect<Output = T::Service, Error = E, Env = Context> + 'static,
        R: Fn(T::Service) -> RelEff + Send + Sync + 'static,
        RelEff: Effect<Output = (), Env = Context> + 'static,
    {
        let release = Arc::new(release);
        Self::from_build(move |input, scope| {
            let effect = acquire();
            let release = release.clone();
            Box::pin(async move {
                let service = execute(effect, &input, None).await?;
                let held = service.clone();
                let release_env = input.clone();
                let registered = scope.add_finalizer(move || async move {
                    if execute(release(held), &release_env, None).await.is_err() {
                        tracing::warn!(service = T::NAME, "layer release failed");
                    }
                });
                if !registered {
                    tracing::debug!(service = T::NAME, "scope closed during acquisition");
                    return Err(Cause::Interrupt);
                }
                Ok(Context::empty().add::<T>(service))
            })
        })
    }

    /// Build both layers from the same input and combine their services.
    pub fn merge(self, other: Layer<E>) -> Self {
        Self::from_build(move |input, scope| {
            let left = (self.build)(input.clone(), scope.clone());
            let right = (other.build)(input, scope);
            Box::pin(async move {
                let left = left.await?;
                let right = right.await?;
                Ok(left.merge(right))
            })
        })
    }

    /// Feed this layer's services into `dependent`.
    ///
    /// The resulting layer provides the services of both.
    pub fn provide_to(self, dependent: Layer<E>) -> Self {
        Self::from_build(move |input, scope| {
            let upstream = self.build.clone();
            let dependent = dependent.build.clone();
            Box::pin(async move {
                let provided = upstream(input.clone(), scope.clone()).await?;
                let built = dependent(input.merge(provided.clone()), scope).await?;
                Ok(provided.merge(built))
            })
        })
    }

    /// Transform the construction error.
    pub fn map_err<E2, F>(self, f: F) -> Layer<E2>
    where
        E2: Send + 'static,
        F: Fn(E) -> E2 + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        Layer::from_build(move |input, scope| {
            let build = (self.build)(input, scope);
            let f = f.clone();
            Box::pin(async move { build.await.map_err(|cause| cause.map(|e| f(e))) })
        })
    }

    /// Build the layer's services, registering releases on `scope`.
    pub(crate) fn build(
        &self,
        input: Context,
        scope: Scope,
    ) -> BoxFuture<'static, Result<Context, Cause<E>>> {
        (self.build)(input, scope)
    }
}
