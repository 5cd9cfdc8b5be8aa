//! Tests for effect constructors, combinators and fiber semantics.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::effect::fiber::execute as run_fiber;
use crate::effect::prelude::*;

// Basic constructor tests
#[tokio::test]
async fn test_pure_returns_value() {
    let effect = pure::<_, String, ()>(42);
    assert_eq!(effect.run_standalone().await, Ok(42));
}

#[tokio::test]
async fn test_fail_returns_expected_failure() {
    let effect = fail::<i32, _, ()>("error".to_string());
    assert_eq!(
        effect.run_standalone().await,
        Err(Cause::Fail("error".to_string()))
    );
}

#[tokio::test]
async fn test_die_returns_defect() {
    let effect = die::<i32, String, ()>(Defect::message("boom"));
    let cause = effect.run_standalone().await.unwrap_err();
    assert!(cause.has_defect());
    assert!(cause.failures().is_empty());
}

// Map tests
#[tokio::test]
async fn test_map_transforms_value() {
    let effect = pure::<_, String, ()>(21).map(|x| x * 2);
    assert_eq!(effect.run_standalone().await, Ok(42));
}

#[tokio::test]
async fn test_map_on_failure_doesnt_execute() {
    let effect = fail::<i32, _, ()>("error".to_string()).map(|x| x * 2);
    assert_eq!(
        effect.run_standalone().await,
        Err(Cause::Fail("error".to_string()))
    );
}

// MapErr tests
#[tokio::test]
async fn test_map_err_transforms_failure() {
    let effect = fail::<i32, _, ()>("error").map_err(|e: &str| format!("wrapped: {}", e));
    assert_eq!(
        effect.run_standalone().await,
        Err(Cause::Fail("wrapped: error".to_string()))
    );
}

#[tokio::test]
async fn test_map_err_leaves_defects_alone() {
    let effect = die::<i32, &str, ()>(Defect::message("boom")).map_err(|e| e.len());
    let cause = effect.run_standalone().await.unwrap_err();
    assert!(matches!(cause, Cause::Die(Defect::Message(ref m)) if m == "boom"));
}

#[tokio::test]
async fn test_map_err_maps_both_parallel_failures() {
    let effect = fail::<i32, _, ()>(1)
        .zip_par(fail::<i32, _, ()>(2))
        .map_err(|e: i32| e * 10);
    let cause = effect.run_standalone().await.unwrap_err();
    assert_eq!(cause.into_failures(), vec![10, 20]);
}

// AndThen tests
#[tokio::test]
async fn test_and_then_chains_effects() {
    let effect = pure::<_, String, ()>(21).and_then(|x| pure(x * 2));
    assert_eq!(effect.run_standalone().await, Ok(42));
}

#[tokio::test]
async fn test_and_then_propagates_failure() {
    let effect = fail::<i32, _, ()>("error".to_string()).and_then(|x| pure(x * 2));
    assert_eq!(
        effect.run_standalone().await,
        Err(Cause::Fail("error".to_string()))
    );
}

// OrElse tests
#[tokio::test]
async fn test_or_else_recovers_from_failure() {
    let effect = fail::<i32, _, ()>("error".to_string()).or_else(|_| pure::<_, String, ()>(42));
    assert_eq!(effect.run_standalone().await, Ok(42));
}

#[tokio::test]
async fn test_or_else_preserves_success() {
    let effect = pure::<_, String, ()>(42).or_else(|_| pure::<_, String, ()>(0));
    assert_eq!(effect.run_standalone().await, Ok(42));
}

#[tokio::test]
async fn test_or_else_never_recovers_defects() {
    let called = Arc::new(AtomicBool::new(false));
    let flag = called.clone();
    let effect = die::<i32, String, ()>(Defect::message("boom")).or_else(move |_| {
        flag.store(true, Ordering::SeqCst);
        pure::<_, String, ()>(0)
    });
    let cause = effect.run_standalone().await.unwrap_err();
    assert!(cause.has_defect());
    assert!(!called.load(Ordering::SeqCst));
}

// Tap tests
#[tokio::test]
async fn test_tap_sees_value_and_keeps_it() {
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = seen.clone();
    let effect = pure::<_, String, ()>(7).tap(move |v| {
        sink.store(*v, Ordering::SeqCst);
        pure::<_, String, ()>(())
    });
    assert_eq!(effect.run_standalone().await, Ok(7));
    assert_eq!(seen.load(Ordering::SeqCst), 7);
}

// FromFn / FromAsync / FromResult tests
#[tokio::test]
async fn test_from_fn_reads_environment() {
    #[derive(Clone)]
    struct Env {
        value: i32,
    }

    let effect = from_fn(|env: &Env| Ok::<_, String>(env.value * 2));
    assert_eq!(effect.execute(&Env { value: 21 }).await, Ok(42));
}

#[tokio::test]
async fn test_from_async_awaits_future() {
    let effect = from_async(|_: &()| async { Ok::<_, String>(42) });
    assert_eq!(effect.run_standalone().await, Ok(42));
}

#[tokio::test]
async fn test_from_result_err_is_expected_failure() {
    let effect = from_result::<i32, _, ()>(Err("nope"));
    assert_eq!(effect.run_standalone().await, Err(Cause::Fail("nope")));
}

// Reader tests
#[tokio::test]
async fn test_asks_and_local() {
    #[derive(Clone)]
    struct Outer {
        inner: u8,
    }

    let effect = local(asks::<_, String, u8, _>(|n: &u8| *n + 1), |o: &Outer| o.inner);
    assert_eq!(effect.execute(&Outer { inner: 1 }).await, Ok(2));
}

// ZipPar tests
#[tokio::test]
async fn test_zip_par_combines_values() {
    let effect = pure::<_, String, ()>(1).zip_par(pure::<_, String, ()>("a"));
    assert_eq!(effect.run_standalone().await, Ok((1, "a")));
}

#[tokio::test]
async fn test_zip_par_keeps_both_failures() {
    let effect = fail::<i32, _, ()>("left").zip_par(fail::<i32, _, ()>("right"));
    let cause = effect.run_standalone().await.unwrap_err();
    assert!(matches!(cause, Cause::Parallel(_, _)));
    assert_eq!(cause.failures(), vec![&"left", &"right"]);
}

// Boxed tests
#[tokio::test]
async fn test_boxed_effects_in_collection() {
    let effects: Vec<BoxedEffect<i32, String, ()>> = vec![
        pure(1).boxed(),
        pure(2).map(|x| x * 2).boxed(),
        fail("bad".to_string()).boxed(),
    ];
    let mut results = Vec::new();
    for effect in effects {
        results.push(effect.run_standalone().await);
    }
    assert_eq!(
        results,
        vec![Ok(1), Ok(4), Err(Cause::Fail("bad".to_string()))]
    );
}

// Fiber tests
#[tokio::test]
async fn test_panic_becomes_defect() {
    let effect = from_fn(|_: &()| -> Result<i32, String> { panic!("kaboom") });
    let cause = run_fiber(effect, &(), None).await.unwrap_err();
    assert!(matches!(cause, Cause::Die(Defect::Panic(ref m)) if m.contains("kaboom")));
}

fn interrupt_after_start(
    token: CancellationToken,
) -> impl Effect<Output = (), Error = String, Env = ()> {
    from_async(move |_: &()| async move {
        token.cancel();
        std::future::pending::<Result<(), String>>().await
    })
}

#[tokio::test]
async fn test_cancelled_signal_reports_interrupt() {
    let token = CancellationToken::new();
    let effect = interrupt_after_start(token.clone());
    let cause = run_fiber(effect, &(), Some(&token)).await.unwrap_err();
    assert!(cause.is_interrupted());
}

#[tokio::test]
async fn test_on_interrupt_handler_runs_before_interrupt_is_reported() {
    let token = CancellationToken::new();
    let handled = Arc::new(AtomicBool::new(false));
    let flag = handled.clone();
    let effect = interrupt_after_start(token.clone()).on_interrupt(move || {
        from_async(move |_: &()| async move {
            tokio::task::yield_now().await;
            flag.store(true, Ordering::SeqCst);
            Ok::<_, String>(())
        })
    });

    let cause = run_fiber(effect, &(), Some(&token)).await.unwrap_err();
    assert!(cause.is_interrupted());
    assert!(handled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_on_interrupt_handler_skipped_on_success() {
    let handled = Arc::new(AtomicBool::new(false));
    let flag = handled.clone();
    let effect = pure::<_, String, ()>(1).on_interrupt(move || {
        from_fn(move |_: &()| {
            flag.store(true, Ordering::SeqCst);
            Ok::<_, String>(())
        })
    });
    assert_eq!(run_fiber(effect, &(), None).await, Ok(1));
    assert!(!handled.load(Ordering::SeqCst));
}

// Bracket tests
fn tracked_bracket<UseEff>(
    log: Arc<Mutex<Vec<&'static str>>>,
    use_effect: UseEff,
) -> impl Effect<Output = UseEff::Output, Error = String, Env = ()>
where
    UseEff: Effect<Error = String, Env = ()>,
{
    let acquire_log = log.clone();
    acquire_release(
        from_fn(move |_: &()| {
            acquire_log.lock().push("acquire");
            Ok::<_, String>("conn")
        }),
        move |_conn| {
            from_fn(move |_: &()| {
                log.lock().push("release");
                Ok::<_, String>(())
            })
        },
        move |_conn: &&str| use_effect,
    )
}

#[tokio::test]
async fn test_acquire_release_releases_after_success() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let effect = tracked_bracket(log.clone(), pure::<_, String, ()>(5));
    assert_eq!(run_fiber(effect, &(), None).await, Ok(5));
    assert_eq!(*log.lock(), vec!["acquire", "release"]);
}

#[tokio::test]
async fn test_acquire_release_releases_after_failure() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let effect = tracked_bracket(log.clone(), fail::<i32, _, ()>("bad".to_string()));
    assert_eq!(
        run_fiber(effect, &(), None).await,
        Err(Cause::Fail("bad".to_string()))
    );
    assert_eq!(*log.lock(), vec!["acquire", "release"]);
}

#[tokio::test]
async fn test_acquire_release_releases_after_interrupt() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let token = CancellationToken::new();
    let effect = tracked_bracket(log.clone(), interrupt_after_start(token.clone()));
    let cause = run_fiber(effect, &(), Some(&token)).await.unwrap_err();
    assert!(cause.is_interrupted());
    assert_eq!(*log.lock(), vec!["acquire", "release"]);
}

#[tokio::test]
async fn test_acquire_release_releases_after_panic() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let effect = tracked_bracket(
        log.clone(),
        from_fn(|_: &()| -> Result<i32, String> { panic!("in use") }),
    );
    let cause = run_fiber(effect, &(), None).await.unwrap_err();
    assert!(cause.has_defect());
    assert_eq!(*log.lock(), vec!["acquire", "release"]);
}

// Scoped tests
#[tokio::test]
async fn test_scoped_closes_scope_when_done() {
    let closed = Arc::new(AtomicBool::new(false));
    let flag = closed.clone();
    let effect = scoped(move |scope: &Scope| {
        let flag = flag.clone();
        scope.add_finalizer(move || async move { flag.store(true, Ordering::SeqCst) });
        pure::<_, String, ()>(3)
    });
    assert_eq!(run_fiber(effect, &(), None).await, Ok(3));
    assert!(closed.load(Ordering::SeqCst));
}
