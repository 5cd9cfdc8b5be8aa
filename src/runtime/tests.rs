use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::context::{service, Tag};
use crate::effect::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Greeter(String);

struct GreeterTag;
impl Tag for GreeterTag {
    type Service = Greeter;
    const NAME: &'static str = "Greeter";
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

fn pool_layer(releases: Arc<AtomicUsize>) -> Layer<String> {
    Layer::scoped::<PoolTag, _, _, _, _>(
        move || {
            let releases = releases.clone();
            from_fn(move |_: &Context| Ok::<_, String>(Pool { releases }))
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
async fn test_runtime_runs_effects_against_its_context() {
    let layer = Layer::<String>::succeed::<GreeterTag>(Greeter("hi".into()));
    let runtime = Runtime::from_layer(&layer).await.unwrap();

    let effect = service::<GreeterTag, String>().map(|g| format!("{} there", g.0));
    assert_eq!(runtime.run(effect).await, Ok("hi there".to_string()));
}

#[tokio::test]
async fn test_missing_service_is_a_defect() {
    let runtime = Runtime::new(Context::empty());
    let cause = runtime
        .run(service::<GreeterTag, String>())
        .await
        .unwrap_err();
    assert_eq!(cause, Cause::Die(Defect::missing_service("Greeter")));
}

#[tokio::test]
async fn test_dispose_releases_resources_exactly_once() {
    let releases = Arc::new(AtomicUsize::new(0));
    let runtime = Runtime::from_layer(&pool_layer(releases.clone()))
        .await
        .unwrap();
    assert!(runtime.is_live());

    runtime.dispose().await;
    runtime.clone().dispose().await;

    assert!(!runtime.is_live());
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_concurrent_dispose_releases_once() {
    let releases = Arc::new(AtomicUsize::new(0));
    let runtime = Runtime::from_layer(&pool_layer(releases.clone()))
        .await
        .unwrap();

    tokio::join!(runtime.dispose(), runtime.dispose(), runtime.dispose());

    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_disposed_runtime_refuses_effects() {
    let runtime = Runtime::new(Context::empty());
    runtime.dispose().await;

    let cause = runtime.run(pure::<_, String, _>(1)).await.unwrap_err();
    assert!(matches!(cause, Cause::Die(Defect::RuntimeUnavailable(_))));
}

#[tokio::test]
async fn test_failed_construction_releases_acquired_services() {
    let releases = Arc::new(AtomicUsize::new(0));
    let failing = Layer::<String>::effect::<GreeterTag, _, _>(|| {
        fail::<Greeter, _, Context>("no greeting".to_string())
    });
    let layer = pool_layer(releases.clone()).provide_to(failing);

    let cause = Runtime::from_layer(&layer).await.unwrap_err();

    assert_eq!(cause, Cause::Fail("no greeting".to_string()));
    assert_eq!(releases.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_provide_to_feeds_upstream_services() {
    let layer = Layer::<String>::succeed::<GreeterTag>(Greeter("hello".into())).provide_to(
        Layer::effect::<PoolTag, _, _>(|| {
            service::<GreeterTag, String>().map(|_| Pool {
                releases: Arc::new(AtomicUsize::new(0)),
            })
        }),
    );
    let runtime = Runtime::from_layer(&layer).await.unwrap();
    assert!(runtime.context().contains::<GreeterTag>());
    assert!(runtime.context().contains::<PoolTag>());
}

#[tokio::test]
async fn test_run_promise_exit_reports_failure() {
    let runtime = Runtime::new(Context::empty());
    let exit = run_promise_exit(
        &runtime,
        fail::<i32, _, Context>("nope"),
        RunOptions::default(),
    )
    .await;
    assert_eq!(exit, Exit::Failure(Cause::Fail("nope")));
}

#[tokio::test]
async fn test_run_promise_unwrapped_translates_single_failure() {
    let runtime = Runtime::new(Context::empty());
    let err = run_promise_unwrapped(
        &runtime,
        fail::<i32, _, Context>("nope"),
        RunOptions::default(),
        true,
    )
    .await
    .unwrap_err();
    assert_eq!(err, QueryError::Failure("nope"));
}

#[tokio::test]
async fn test_run_promise_unwrapped_keeps_defects_as_causes() {
    let runtime = Runtime::new(Context::empty());
    let err = run_promise_unwrapped(
        &runtime,
        die::<i32, &str, Context>(Defect::message("boom")),
        RunOptions::default(),
        true,
    )
    .await
    .unwrap_err();
    assert!(err.is_defect());
    assert!(err.failure().is_none());
}

#[tokio::test]
async fn test_run_promise_unwrapped_without_translation() {
    let runtime = Runtime::new(Context::empty());
    let err = run_promise_unwrapped(
        &runtime,
        fail::<i32, _, Context>("nope"),
        RunOptions::default(),
        false,
    )
    .await
    .unwrap_err();
    assert_eq!(err, QueryError::Cause(Cause::Fail("nope")));
}

#[tokio::test]
async fn test_signal_interrupts_run() {
    let runtime = Runtime::new(Context::empty());
    let token = CancellationToken::new();
    let trigger = token.clone();
    let effect = from_async(move |_: &Context| async move {
        trigger.cancel();
        std::future::pending::<Result<(), String>>().await
    });

    let result = run_promise(&runtime, effect, RunOptions::with_signal(token)).await;
    assert_eq!(result, Err(Cause::Interrupt));
}

#[tokio::test]
async fn test_global_runtime_initializes_once() {
    static GLOBAL: GlobalRuntime = GlobalRuntime::new();
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let layer = Layer::<String>::effect::<GreeterTag, _, _>(move || {
        let counter = counter.clone();
        from_fn(move |_: &Context| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(Greeter("global".into()))
        })
    });

    let first = GLOBAL.init(&layer).await.unwrap();
    let second = GLOBAL.init(&layer).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(GLOBAL.get(), Some(first));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}
