//! Typed service registry.
//!
//! A [`Context`] maps [`Tag`]s to services. It is the environment of every
//! effect a [`Runtime`](crate::runtime::Runtime) executes, and it is only
//! ever assembled explicitly: by a [`Layer`](crate::layer::Layer) when the
//! runtime is constructed, or by hand with [`Context::add`]. There is no
//! global lookup.
//!
//! # Example
//!
//! ```
//! use stillwater_query::{Context, Tag};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Greeting(&'static str);
//!
//! struct GreetingTag;
//! impl Tag for GreetingTag {
//!     type Service = Greeting;
//!     const NAME: &'static str = "Greeting";
//! }
//!
//! let ctx = Context::empty().add::<GreetingTag>(Greeting("hello"));
//! assert_eq!(ctx.get::<GreetingTag>(), Some(Greeting("hello")));
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::effect::cause::{Cause, Defect};
use crate::effect::trait_def::Effect;

/// A unique key for one service in a [`Context`].
///
/// The implementing type is the key; it is usually an empty struct.
pub trait Tag: Send + Sync + 'static {
    /// The service stored under this tag.
    type Service: Clone + Send + Sync + 'static;

    /// Human-readable name used in defects and logs.
    const NAME: &'static str;
}

#[derive(Clone)]
struct Entry {
    name: &'static str,
    service: Arc<dyn Any + Send + Sync>,
}

/// An immutable, cheaply clonable map from tags to services.
#[derive(Clone, Default)]
pub struct Context {
    services: Arc<HashMap<TypeId, Entry>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.services.values().map(|e| e.name).collect();
        names.sort_unstable();
        f.debug_struct("Context").field("services", &names).finish()
    }
}

impl Context {
    /// A context with no services.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Return a context that also provides `service` under `T`.
    ///
    /// An existing service under the same tag is replaced.
    pub fn add<T: Tag>(self, service: T::Service) -> Self {
        let mut services = Arc::unwrap_or_clone(self.services);
        services.insert(
            TypeId::of::<T>(),
            Entry {
                name: T::NAME,
                service: Arc::new(service),
            },
        );
        Context {
            services: Arc::new(services),
        }
    }

    /// Look up the service stored under `T`.
    pub fn get<T: Tag>(&self) -> Option<T::Service> {
        self.services
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.service.downcast_ref::<T::Service>())
            .cloned()
    }

    /// Whether a service is stored under `T`.
    pub fn contains<T: Tag>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Union of two contexts; services in `other` win.
    pub fn merge(self, other: Context) -> Self {
        if other.services.is_empty() {
            return self;
        }
        let mut services = Arc::unwrap_or_clone(self.services);
        services.extend(other.services.iter().map(|(k, v)| (*k, v.clone())));
        Context {
            services: Arc::new(services),
        }
    }

    /// Number of services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the context has no services.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

/// Effect that looks up a service from the [`Context`].
///
/// Created by [`service`].
pub struct Service<T, E> {
    _phantom: PhantomData<fn() -> (T, E)>,
}

impl<T, E> fmt::Debug for Service<T, E>
where
    T: Tag,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service").field("tag", &T::NAME).finish()
    }
}

impl<T, E> Effect for Service<T, E>
where
    T: Tag,
    E: Send,
{
    type Output = T::Service;
    type Error = E;
    type Env = Context;

    async fn run(self, env: &Context) -> Result<T::Service, Cause<E>> {
        env.get::<T>().ok_or_else(|| {
            tracing::warn!(service = T::NAME, "service missing from context");
            Cause::Die(Defect::missing_service(T::NAME))
        })
    }
}

/// Look up the service stored under `T`.
///
/// A missing service is a wiring bug, so it fails with
/// [`Defect::MissingService`] rather than an expected error.
///
/// # Example
///
/// ```rust,ignore
/// let effect = service::<TodoClientTag, TodoError>()
///     .and_then(|client| client.call::<GetTodo>(GetTodoPayload { id: 1 }));
/// ```
pub fn service<T, E>() -> Service<T, E>
where
    T: Tag,
    E: Send,
{
    Service {
        _phantom: PhantomData,
    }
}
