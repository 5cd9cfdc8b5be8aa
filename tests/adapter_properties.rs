//! Properties of the promise adapter and runtime disposal

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use proptest::prelude::*;
use stillwater_query::prelude::*;

struct CounterTag;
impl Tag for CounterTag {
    type Service = Arc<AtomicUsize>;
    const NAME: &'static str = "Counter";
}

fn failing(error: String) -> impl Effect<Output = i32, Error = String, Env = Context> {
    fail(error)
}

fn dying(message: String) -> impl Effect<Output = i32, Error = String, Env = Context> {
    die(Defect::message(message))
}

proptest! {
    #[test]
    fn prop_cause_rejecting_mode_keeps_the_failure(error in ".*") {
        let runtime = Runtime::new(Context::empty());
        let cause = tokio_test::block_on(run_promise(
            &runtime,
            failing(error.clone()),
            RunOptions::default(),
        ))
        .unwrap_err();
        prop_assert_eq!(cause.into_failures(), vec![error]);
    }

    #[test]
    fn prop_throw_on_defect_unwraps_only_expected_failures(error in ".*") {
        let runtime = Runtime::new(Context::empty());

        let failed = tokio_test::block_on(run_promise_unwrapped(
            &runtime,
            failing(error.clone()),
            RunOptions::default(),
            true,
        ));
        prop_assert_eq!(failed, Err(QueryError::Failure(error.clone())));

        let died = tokio_test::block_on(run_promise_unwrapped(
            &runtime,
            dying(error),
            RunOptions::default(),
            true,
        ))
        .unwrap_err();
        prop_assert!(died.is_defect());
        prop_assert!(died.failure().is_none());
    }

    #[test]
    fn prop_exit_mode_always_resolves(value in any::<i32>(), fails in any::<bool>()) {
        let runtime = Runtime::new(Context::empty());
        let effect = if fails {
            failing(value.to_string()).boxed()
        } else {
            pure::<_, String, Context>(value).boxed()
        };
        let exit = tokio_test::block_on(run_promise_exit(&runtime, effect, RunOptions::default()));
        match exit {
            Exit::Success(v) => prop_assert_eq!(v, value),
            Exit::Failure(cause) => prop_assert_eq!(cause.into_failures(), vec![value.to_string()]),
        }
    }
}

#[tokio::test]
async fn disposing_twice_releases_once() {
    let releases = Arc::new(AtomicUsize::new(0));
    let layer = Layer::<String>::scoped::<CounterTag, _, _, _, _>(
        {
            let releases = releases.clone();
            move || pure::<_, String, Context>(releases.clone())
        },
        |counter: Arc<AtomicUsize>| {
            from_fn(move |_: &Context| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(())
            })
        },
    );
    let runtime = Runtime::from_layer(&layer).await.unwrap();

    runtime.dispose().await;
    runtime.dispose().await;

    assert_eq!(releases.load(Ordering::SeqCst), 1);
    let refused = runtime.run(pure::<_, String, Context>(1)).await.unwrap_err();
    assert!(matches!(refused, Cause::Die(Defect::RuntimeUnavailable(_))));
}
