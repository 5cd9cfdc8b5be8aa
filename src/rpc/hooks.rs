//! Query and mutation hooks for RPC procedures.

use std::fmt;
use std::marker::PhantomData;

use crate::bridge::{
    EffectMutation, EffectMutationOptions, EffectQueries, EffectQuery, EffectQueryOptions,
    MutationSettings, QuerySettings, RuntimeAccessor,
};
use crate::context::{service, Context, Tag};
use crate::effect::ext::EffectExt;
use crate::effect::tracing::EffectTracingExt;
use crate::effect::trait_def::Effect;
use crate::query::{isolated_key, QueryKey};
use crate::rpc::client::RpcClient;
use crate::rpc::schema::Procedure;

/// Cache key of a query calling `P` with `payload`: `[P::NAME, payload]`.
///
/// Structurally equal payloads give equal keys. A payload that does not
/// serialize to JSON has no key.
pub fn rpc_query_key<P: Procedure>(payload: &P::Payload) -> Result<QueryKey, serde_json::Error> {
    QueryKey::new().push(P::NAME).push_serialized(payload)
}

/// Look up the client under `T` and call `P`.
///
/// A missing client is a defect.
pub fn rpc_effect<T, P>(
    payload: P::Payload,
) -> impl Effect<Output = P::Success, Error = P::Error, Env = Context>
where
    P: Procedure,
    T: Tag<Service = RpcClient<P::Group>>,
{
    service::<T, P::Error>()
        .and_then(move |client| client.call::<P>(payload))
        .instrument(tracing::debug_span!("rpc", procedure = P::NAME))
}

/// RPC hooks bound to the client registered under `T`.
pub struct RpcHooks<T> {
    queries: EffectQueries,
    _tag: PhantomData<fn() -> T>,
}

impl<T> Clone for RpcHooks<T> {
    fn clone(&self) -> Self {
        RpcHooks {
            queries: self.queries.clone(),
            _tag: PhantomData,
        }
    }
}

impl<T: Tag> fmt::Debug for RpcHooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcHooks")
            .field("client", &T::NAME)
            .field("queries", &self.queries)
            .finish()
    }
}

/// Bind RPC hooks to the client under `T`, run on `accessor`'s runtime.
pub fn make_rpc_hooks<T: Tag>(accessor: RuntimeAccessor) -> RpcHooks<T> {
    RpcHooks {
        queries: EffectQueries::new(accessor),
        _tag: PhantomData,
    }
}

impl<T: Tag> RpcHooks<T> {
    /// Observe procedure `P`.
    ///
    /// `payload` and `settings` are read reactively; a new payload means a
    /// new key and therefore a new fetch.
    ///
    /// A payload without a key is cached under a key private to this hook,
    /// and the call dies with [`Defect::Decode`](crate::effect::Defect::Decode).
    pub fn use_rpc_query<P>(
        &self,
        payload: impl Fn() -> P::Payload + 'static,
        settings: impl Fn() -> QuerySettings<P::Error> + 'static,
    ) -> EffectQuery<P::Success, P::Error>
    where
        P: Procedure,
        T: Tag<Service = RpcClient<P::Group>>,
    {
        let unkeyed = isolated_key(QueryKey::new().push(P::NAME));
        self.queries.use_query(move || {
            let payload = payload();
            let key = rpc_query_key::<P>(&payload).unwrap_or_else(|err| {
                tracing::warn!(procedure = P::NAME, error = %err, "rpc payload has no query key");
                unkeyed.clone()
            });
            EffectQueryOptions::new(key, move |_| {
                rpc_effect::<T, P>(payload.clone())
            })
            .settings(settings())
        })
    }

    /// A mutation calling procedure `P` with the mutation variables.
    pub fn use_rpc_mutation<P>(
        &self,
        settings: impl Fn() -> MutationSettings<P::Payload, P::Success, P::Error> + 'static,
    ) -> EffectMutation<P::Payload, P::Success, P::Error>
    where
        P: Procedure,
        T: Tag<Service = RpcClient<P::Group>>,
    {
        self.queries.use_mutation(move || {
            EffectMutationOptions::new(rpc_effect::<T, P>)
                .key(QueryKey::new().push(P::NAME))
                .settings(settings())
        })
    }
}

/// [`RpcHooks::use_rpc_query`] without building hooks first.
pub fn rpc_query<T, P>(
    accessor: RuntimeAccessor,
    payload: impl Fn() -> P::Payload + 'static,
    settings: impl Fn() -> QuerySettings<P::Error> + 'static,
) -> EffectQuery<P::Success, P::Error>
where
    P: Procedure,
    T: Tag<Service = RpcClient<P::Group>>,
{
    make_rpc_hooks::<T>(accessor).use_rpc_query::<P>(payload, settings)
}

/// [`RpcHooks::use_rpc_mutation`] without building hooks first.
pub fn rpc_mutation<T, P>(
    accessor: RuntimeAccessor,
    settings: impl Fn() -> MutationSettings<P::Payload, P::Success, P::Error> + 'static,
) -> EffectMutation<P::Payload, P::Success, P::Error>
where
    P: Procedure,
    T: Tag<Service = RpcClient<P::Group>>,
{
    make_rpc_hooks::<T>(accessor).use_rpc_mutation::<P>(settings)
}
