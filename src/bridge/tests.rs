//! Tests for runtime providers and effect-backed hooks.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use leptos_reactive::{create_runtime, RwSignal, SignalGet, SignalSet};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::LocalSet;
use tracing_test::traced_test;

use super::*;
use crate::effect::prelude::*;
use crate::layer::Layer;
use crate::query::provide_query_client;
use crate::query_key;
use crate::runtime::{GlobalRuntime, QueryError, Runtime};

#[derive(Debug, Clone)]
struct Greeter(String);

struct GreeterTag;
impl Tag for GreeterTag {
    type Service = Greeter;
    const NAME: &'static str = "Greeter";
}

fn greeter_layer(greeting: &str) -> Layer<String> {
    Layer::succeed::<GreeterTag>(Greeter(greeting.to_string()))
}

/// A reactive runtime with a query client at its root.
fn reactive_root() -> leptos_reactive::RuntimeId {
    let runtime = create_runtime();
    provide_query_client();
    runtime
}

async fn until(cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

fn greeting_query() -> EffectQueryOptions<impl Effect<Output = String, Error = String, Env = Context>>
{
    EffectQueryOptions::new(query_key!["greeting"], |_| {
        service::<GreeterTag, String>().map(|g: Greeter| g.0)
    })
}

#[tokio::test]
async fn test_query_waits_for_runtime_then_fetches() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let scope = make_runtime_scope(|greeting: &String| greeter_layer(greeting));
            let mut query = None;
            let _provider = scope.provider("hello".to_string(), || {
                query = Some(scope.use_effect_query(greeting_query));
            });
            let query = query.unwrap();

            assert!(query.is_pending());
            assert!(!query.is_fetching());

            query.settled().await;
            assert_eq!(query.data().as_deref(), Some("hello"));
            assert_eq!(query.key(), query_key!["greeting"]);
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_failed_runtime_fails_queries_with_construction_defect() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let scope = make_runtime_scope(|_: &()| {
                Layer::<String>::effect::<GreeterTag, _, _>(|| {
                    fail::<Greeter, _, Context>("no config".to_string())
                })
            });
            let mut query = None;
            let mut accessor = None;
            let _provider = scope.provider((), || {
                accessor = Some(scope.use_runtime());
                query = Some(scope.use_effect_query(greeting_query));
            });
            let (query, accessor) = (query.unwrap(), accessor.unwrap());

            query.settled().await;

            assert_eq!(query.status(), QueryStatus::Error);
            let error = query.error().unwrap();
            assert!(error.is_defect());
            let defects = error.cause().map(|c| c.defects().len());
            assert_eq!(defects, Some(1));
            assert!(matches!(
                accessor.resolve(),
                Err(Defect::Construction(ref message)) if message.contains("no config")
            ));
            reactive.dispose();
        })
        .await;
}

#[derive(Debug, Clone)]
struct Pool {
    releases: Arc<AtomicUsize>,
}

struct PoolTag;
impl Tag for PoolTag {
    type Service = Pool;
    const NAME: &'static str = "Pool";
}

fn pool_layer(releases: Arc<AtomicUsize>, gate: Option<Arc<Notify>>) -> Layer<String> {
    Layer::scoped::<PoolTag, _, _, _, _>(
        move || {
            let releases = releases.clone();
            let gate = gate.clone();
            from_async(move |_: &Context| async move {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                Ok::<_, String>(Pool { releases })
            })
        },
        |pool: Pool| {
            from_fn(move |_: &Context| {
                pool.releases.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
        },
    )
}

#[tokio::test]
async fn test_teardown_disposes_runtime() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let releases = Arc::new(AtomicUsize::new(0));
            let scope = {
                let releases = releases.clone();
                make_runtime_scope(move |_: &()| pool_layer(releases.clone(), None))
            };
            let mut accessor = None;
            let provider = scope.provider((), || accessor = Some(scope.use_runtime()));
            let accessor = accessor.unwrap();
            until(|| accessor.is_ready()).await;
            let runtime = accessor.resolve().unwrap();

            provider.dispose().await;

            assert_eq!(accessor.status(), RuntimeStatus::Disposed);
            assert!(!runtime.is_live());
            assert_eq!(releases.load(Ordering::SeqCst), 1);
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_dropping_provider_disposes_runtime_in_background() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let releases = Arc::new(AtomicUsize::new(0));
            let scope = {
                let releases = releases.clone();
                make_runtime_scope(move |_: &()| pool_layer(releases.clone(), None))
            };
            let mut accessor = None;
            let provider = scope.provider((), || accessor = Some(scope.use_runtime()));
            let accessor = accessor.unwrap();
            until(|| accessor.is_ready()).await;

            drop(provider);

            assert_eq!(accessor.status(), RuntimeStatus::Disposed);
            until(|| releases.load(Ordering::SeqCst) == 1).await;
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_runtime_built_after_teardown_is_disposed() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let releases = Arc::new(AtomicUsize::new(0));
            let gate = Arc::new(Notify::new());
            let scope = {
                let releases = releases.clone();
                let gate = gate.clone();
                make_runtime_scope(move |_: &()| pool_layer(releases.clone(), Some(gate.clone())))
            };
            let mut accessor = None;
            let provider = scope.provider((), || accessor = Some(scope.use_runtime()));
            let accessor = accessor.unwrap();
            tokio::task::yield_now().await;
            assert!(accessor.status().is_pending());

            provider.dispose().await;
            gate.notify_one();

            until(|| releases.load(Ordering::SeqCst) == 1).await;
            assert_eq!(accessor.status(), RuntimeStatus::Disposed);
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_throw_on_defect_unwraps_expected_failure() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let runtime = Runtime::new(Context::empty());
            let queries = make_query_hook(RuntimeAccessor::fixed(runtime));
            let unwrapped = queries.use_query(|| {
                EffectQueryOptions::new(query_key!["a"], |_| {
                    fail::<i32, _, Context>("not found".to_string())
                })
                .throw_on_defect(true)
            });
            let wrapped = queries.use_query(|| {
                EffectQueryOptions::new(query_key!["b"], |_| {
                    fail::<i32, _, Context>("not found".to_string())
                })
            });
            unwrapped.settled().await;
            wrapped.settled().await;

            assert_eq!(
                unwrapped.error(),
                Some(QueryError::Failure("not found".to_string()))
            );
            assert_eq!(
                wrapped.error(),
                Some(QueryError::Cause(Cause::Fail("not found".to_string())))
            );
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_throw_on_defect_keeps_defects_as_causes() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let queries = make_query_hook(RuntimeAccessor::fixed(Runtime::new(Context::empty())));
            let query = queries.use_query(|| {
                EffectQueryOptions::new(query_key!["missing"], |_| {
                    service::<GreeterTag, String>().map(|g: Greeter| g.0)
                })
                .throw_on_defect(true)
            });
            query.settled().await;

            let error = query.error().unwrap();
            assert!(error.failure().is_none());
            assert_eq!(
                error.cause(),
                Some(&Cause::Die(Defect::missing_service("Greeter")))
            );
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_matching_query_error_is_thrown_to_boundary() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let boundary = ErrorBoundary::provide();
            let queries = make_query_hook(RuntimeAccessor::fixed(Runtime::new(Context::empty())));
            let fatal = queries.use_query(|| {
                EffectQueryOptions::new(query_key!["fatal"], |_| {
                    fail::<i32, _, Context>("gone".to_string())
                })
                .throw_on_error(|error| {
                    error.is_defect() || error.failures().iter().any(|f| f.as_str() == "gone")
                })
            });
            fatal.settled().await;

            let thrown = boundary.error().unwrap();
            assert_eq!(thrown.origin, query_key!["fatal"].to_string());
            assert!(thrown.message.contains("gone"));
            assert!(fatal.is_error());

            boundary.reset();
            let tolerated = queries.use_query(|| {
                EffectQueryOptions::new(query_key!["tolerated"], |_| {
                    fail::<i32, _, Context>("retry later".to_string())
                })
                .throw_on_error(|error| error.is_defect())
            });
            tolerated.settled().await;

            assert!(tolerated.is_error());
            assert_eq!(boundary.error(), None);
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_disabled_query_waits_until_enabled() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let calls = Arc::new(AtomicUsize::new(0));
            let enabled = RwSignal::new(false);
            let queries = make_query_hook(RuntimeAccessor::fixed(Runtime::new(Context::empty())));
            let query = {
                let calls = calls.clone();
                queries.use_query(move || {
                    let calls = calls.clone();
                    EffectQueryOptions::new(query_key!["gated"], move |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        pure::<_, String, Context>(7u32)
                    })
                    .enabled(enabled.get())
                })
            };
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            assert!(query.is_pending());
            assert!(!query.is_fetching());
            assert_eq!(calls.load(Ordering::SeqCst), 0);

            enabled.set(true);
            query.settled().await;

            assert_eq!(query.data(), Some(7));
            assert_eq!(calls.load(Ordering::SeqCst), 1);
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_unmount_interrupts_fetch_and_waits_for_finalizers() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let interrupted = Arc::new(AtomicBool::new(false));
            let scope = make_runtime_scope(|_: &()| greeter_layer("hi"));
            let mut query = None;
            let provider = {
                let interrupted = interrupted.clone();
                scope.provider((), || {
                    query = Some(scope.use_effect_query(move || {
                        let interrupted = interrupted.clone();
                        EffectQueryOptions::new(query_key!["forever"], move |_| {
                            let interrupted = interrupted.clone();
                            from_async(|_: &Context| std::future::pending::<Result<i32, String>>())
                                .on_interrupt(move || {
                                    from_async(move |_: &Context| async move {
                                        tokio::task::yield_now().await;
                                        interrupted.store(true, Ordering::SeqCst);
                                        Ok::<_, String>(())
                                    })
                                })
                        })
                    }));
                })
            };
            let query = query.unwrap();
            until(|| query.is_fetching()).await;
            tokio::task::yield_now().await;

            provider.dispose().await;

            assert!(interrupted.load(Ordering::SeqCst));
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_mutation_runs_effect_callbacks() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let queries = make_query_hook(RuntimeAccessor::fixed(Runtime::new(Context::empty())));
            let mutation = {
                let seen = seen.clone();
                queries.use_mutation(move || {
                    let seen = seen.clone();
                    EffectMutationOptions::<String, _>::new(|name: String| {
                        pure::<_, String, Context>(format!("created {}", name))
                    })
                    .on_success(move |data: String, _vars, _ctx: Option<()>| {
                        let seen = seen.clone();
                        from_fn(move |_: &Context| {
                            seen.lock().push(data);
                            Ok::<_, String>(())
                        })
                    })
                })
            };

            let exit = mutation.mutate_async("Alice".to_string()).await;

            assert_eq!(exit, Exit::Success("created Alice".to_string()));
            assert_eq!(*seen.lock(), vec!["created Alice".to_string()]);
            assert_eq!(mutation.data().as_deref(), Some("created Alice"));
            assert_eq!(
                mutation.state().variables().map(String::as_str),
                Some("Alice")
            );
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_callbacks_run_in_order_with_mutate_context() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let order = Arc::new(Mutex::new(Vec::new()));
            let queries = make_query_hook(RuntimeAccessor::fixed(Runtime::new(Context::empty())));
            let record = |order: &Arc<Mutex<Vec<String>>>, entry: String| {
                let order = order.clone();
                from_fn(move |_: &Context| {
                    order.lock().push(entry.clone());
                    Ok::<_, String>(())
                })
            };
            let mutation = {
                let order = order.clone();
                queries.use_mutation(move || {
                    let (o1, o2, o3) = (order.clone(), order.clone(), order.clone());
                    EffectMutationOptions::new(|n: u32| fail::<u32, _, Context>(format!("no {}", n)))
                        .on_mutate(move |n: u32| {
                            let order = o1.clone();
                            from_fn(move |_: &Context| {
                                order.lock().push(format!("mutate {}", n));
                                Ok::<_, String>(n * 10)
                            })
                        })
                        .on_error(move |error, _n, ctx: Option<u32>| {
                            record(&o2, format!("error {:?} {:?}", error.failures(), ctx))
                        })
                        .on_settled(move |data, _error, _n, ctx| {
                            record(&o3, format!("settled {:?} {:?}", data, ctx))
                        })
                })
            };

            let exit = mutation.mutate_async(4).await;

            assert_eq!(exit, Exit::Failure(Cause::Fail("no 4".to_string())));
            assert_eq!(
                *order.lock(),
                vec![
                    "mutate 4".to_string(),
                    "error [\"no 4\"] Some(40)".to_string(),
                    "settled None Some(40)".to_string(),
                ]
            );
            assert!(mutation.is_error());
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_failing_callback_keeps_exit_and_reaches_boundary() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let boundary = ErrorBoundary::provide();
            let queries = make_query_hook(RuntimeAccessor::fixed(Runtime::new(Context::empty())));
            let mutation = queries.use_mutation(|| {
                EffectMutationOptions::<u32, _>::new(|n: u32| pure::<_, String, Context>(n))
                    .on_success(|_, _, _: Option<()>| {
                        fail::<(), _, Context>("cache write failed".to_string())
                    })
            });

            let exit = mutation.mutate_async(1).await;

            assert_eq!(exit, Exit::Success(1));
            assert!(mutation.is_success());
            assert_eq!(mutation.data(), Some(1));
            let thrown = boundary.error().unwrap();
            assert_eq!(thrown.origin, "on_success");
            assert!(thrown.message.contains("cache write failed"));
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
#[traced_test]
async fn test_failing_callback_without_boundary_is_logged() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let queries = make_query_hook(RuntimeAccessor::fixed(Runtime::new(Context::empty())));
            let mutation = queries.use_mutation(|| {
                EffectMutationOptions::<u32, _>::new(|n: u32| pure::<_, String, Context>(n))
                    .on_settled(|_, _, _, _: Option<()>| {
                        fail::<(), _, Context>("audit log offline".to_string())
                    })
            });

            let exit = mutation.mutate_async(2).await;

            assert_eq!(exit, Exit::Success(2));
            assert!(logs_contain("mutation callback failed"));
            assert!(logs_contain("no error boundary in scope"));
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_mutation_without_runtime_fails() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let queries = EffectQueries::new(RuntimeAccessor::from_context());
            let mutation = queries.use_mutation(|| {
                EffectMutationOptions::<u32, _>::new(|n: u32| pure::<_, String, Context>(n))
            });

            let exit = mutation.mutate_async(1).await;

            assert!(matches!(
                exit,
                Exit::Failure(Cause::Die(Defect::RuntimeUnavailable(_)))
            ));
            assert!(mutation.is_error());
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_only_latest_mutation_writes_state() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let release = Arc::new(Notify::new());
            let queries = make_query_hook(RuntimeAccessor::fixed(Runtime::new(Context::empty())));
            let mutation = {
                let release = release.clone();
                queries.use_mutation(move || {
                    let release = release.clone();
                    EffectMutationOptions::<u32, _>::new(move |n: u32| {
                        let release = release.clone();
                        from_async(move |_: &Context| async move {
                            if n == 1 {
                                release.notified().await;
                            }
                            Ok::<_, String>(n)
                        })
                    })
                })
            };

            let slow = tokio::task::spawn_local(mutation.mutate_async(1));
            tokio::task::yield_now().await;
            assert_eq!(mutation.mutate_async(2).await, Exit::Success(2));
            release.notify_one();

            assert_eq!(slow.await.unwrap(), Exit::Success(1));
            assert_eq!(mutation.data(), Some(2));

            mutation.reset();
            assert!(mutation.is_idle());
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_accessor_sources_are_distinct() {
    static GLOBAL: GlobalRuntime = GlobalRuntime::new();
    let reactive = create_runtime();

    let global = RuntimeAccessor::global(&GLOBAL);
    assert!(matches!(
        global.status(),
        RuntimeStatus::Failed(Defect::RuntimeUnavailable(_))
    ));

    let runtime = Runtime::new(Context::empty());
    let fixed = RuntimeAccessor::fixed(runtime.clone());
    assert_eq!(fixed.resolve(), Ok(runtime.clone()));
    runtime.dispose().await;
    assert_eq!(fixed.status(), RuntimeStatus::Disposed);
    assert!(fixed.resolve().is_err());

    GLOBAL.init(&greeter_layer("global")).await.unwrap();
    assert!(global.is_ready());
    assert!(global.ready().await.is_ok());

    let outside = RuntimeAccessor::from_context();
    assert!(matches!(
        outside.status(),
        RuntimeStatus::Failed(Defect::RuntimeUnavailable(ref m)) if m.contains("no runtime provider")
    ));
    reactive.dispose();
}

#[tokio::test]
async fn test_nested_scopes_do_not_shadow_each_other() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let outer = make_runtime_scope(|_: &()| greeter_layer("outer"));
            let inner = make_runtime_scope(|_: &()| greeter_layer("inner"));
            let mut queries = None;
            let mut innermost = None;
            let mut inner_provider = None;
            let _outer_provider = outer.provider((), || {
                inner_provider = Some(inner.provider((), || {
                    innermost = Some(RuntimeAccessor::from_context());
                    queries = Some((
                        outer.use_effect_query(|| {
                            EffectQueryOptions::new(query_key!["outer"], |_| {
                                service::<GreeterTag, String>().map(|g: Greeter| g.0)
                            })
                        }),
                        inner.use_effect_query(|| {
                            EffectQueryOptions::new(query_key!["inner"], |_| {
                                service::<GreeterTag, String>().map(|g: Greeter| g.0)
                            })
                        }),
                    ));
                }));
            });
            let (outer_query, inner_query) = queries.unwrap();

            outer_query.settled().await;
            inner_query.settled().await;

            assert_eq!(outer_query.data().as_deref(), Some("outer"));
            assert_eq!(inner_query.data().as_deref(), Some("inner"));
            let innermost = innermost.unwrap().resolve().unwrap();
            let greeting = innermost.run(service::<GreeterTag, String>()).await.unwrap();
            assert_eq!(greeting.0, "inner");
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_infinite_query_threads_page_param_into_effect() {
    LocalSet::new()
        .run_until(async {
            let reactive = reactive_root();
            let queries = make_query_hook(RuntimeAccessor::fixed(Runtime::new(Context::empty())));
            let pages = queries.use_infinite_query(|| {
                EffectInfiniteQueryOptions::new(
                    query_key!["feed"],
                    |ctx: &PageContext<u32>| {
                        pure::<_, String, Context>(format!("page {}", ctx.page_param))
                    },
                    1u32,
                    |_, _, p: &u32, _| (*p < 2).then_some(p + 1),
                )
                .get_previous_page_param(|_, _, p: &u32, _| p.checked_sub(1))
            });
            pages.settled().await;
            assert!(pages.has_next_page());

            assert_eq!(pages.fetch_next_page().await, Ok(true));
            assert_eq!(pages.fetch_previous_page().await, Ok(true));

            assert_eq!(
                pages.pages(),
                vec!["page 0".to_string(), "page 1".to_string(), "page 2".to_string()]
            );
            assert!(!pages.has_next_page());
            assert_eq!(pages.fetch_next_page().await, Ok(false));
            assert_eq!(
                pages.query().data().map(|data| data.page_params),
                Some(vec![0, 1, 2])
            );
            reactive.dispose();
        })
        .await;
}
