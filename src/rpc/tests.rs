use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use leptos_reactive::{create_runtime, RwSignal, SignalGet, SignalSet};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::task::LocalSet;

use super::*;
use crate::bridge::{MutationSettings, QuerySettings, RuntimeAccessor};
use crate::context::{Context, Tag};
use crate::effect::boxed::BoxFuture;
use crate::effect::cause::{Cause, Defect};
use crate::effect::exit::Exit;
use crate::query::provide_query_client;
use crate::query_key;
use crate::runtime::{QueryError, Runtime};

struct TodoRpcs;
impl RpcGroup for TodoRpcs {
    const NAME: &'static str = "todos";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Todo {
    id: u32,
    title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TodoNotFound {
    id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct GetTodoPayload {
    id: u32,
}

struct GetTodo;
impl Procedure for GetTodo {
    type Group = TodoRpcs;
    const NAME: &'static str = "getTodo";
    type Payload = GetTodoPayload;
    type Success = Todo;
    type Error = TodoNotFound;
}

struct CreateTodo;
impl Procedure for CreateTodo {
    type Group = TodoRpcs;
    const NAME: &'static str = "createTodo";
    type Payload = String;
    type Success = Todo;
    type Error = TodoNotFound;
}

struct TodoClient;
impl Tag for TodoClient {
    type Service = RpcClient<TodoRpcs>;
    const NAME: &'static str = "TodoClient";
}

#[derive(Default)]
struct InMemory {
    calls: AtomicUsize,
}

impl RpcTransport for InMemory {
    fn send(
        &self,
        procedure: &'static str,
        payload: Value,
    ) -> BoxFuture<'static, Result<RpcReply, RpcTransportError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = match procedure {
            "getTodo" => {
                let id = payload["id"].as_u64().unwrap_or_default();
                if id == 404 {
                    Ok(RpcReply::Failure(json!({ "id": id })))
                } else {
                    Ok(RpcReply::Success(json!({ "id": id, "title": format!("todo {}", id) })))
                }
            }
            "createTodo" => Ok(RpcReply::Success(json!({ "id": 7, "title": payload }))),
            "garbled" => Ok(RpcReply::Success(json!("not a todo"))),
            other => Err(RpcTransportError::UnknownProcedure(other.to_string())),
        };
        Box::pin(async move { reply })
    }
}

fn client(transport: Arc<InMemory>) -> Runtime {
    Runtime::new(Context::empty().add::<TodoClient>(RpcClient::new(transport)))
}

fn reactive_root() -> leptos_reactive::RuntimeId {
    let runtime = create_runtime();
    provide_query_client();
    runtime
}

#[test]
fn test_query_key_uses_name_and_payload() {
    let key = rpc_query_key::<GetTodo>(&GetTodoPayload { id: 1 }).unwrap();
    assert_eq!(key, query_key!["getTodo", { "id": 1 }]);
    assert_ne!(key, rpc_query_key::<GetTodo>(&GetTodoPayload { id: 2 }).unwrap());
}

/// Maps with tuple keys have no JSON encoding.
struct TagCounts;
impl Procedure for TagCounts {
    type Group = TodoRpcs;
    const NAME: &'static str = "tagCounts";
    type Payload = BTreeMap<(u8, u8), u8>;
    type Success = Todo;
    type Error = TodoNotFound;
}

#[test]
fn test_payload_without_json_encoding_has_no_key() {
    let payload = BTreeMap::from([((1, 2), 1)]);
    assert!(rpc_query_key::<TagCounts>(&payload).is_err());
}

#[tokio::test]
async fn test_call_decodes_success_and_declared_failure() {
    let transport = Arc::new(InMemory::default());
    let runtime = client(transport.clone());

    let todo = runtime
        .run(rpc_effect::<TodoClient, GetTodo>(GetTodoPayload { id: 1 }))
        .await;
    assert_eq!(
        todo,
        Ok(Todo {
            id: 1,
            title: "todo 1".into()
        })
    );

    let missing = runtime
        .run(rpc_effect::<TodoClient, GetTodo>(GetTodoPayload { id: 404 }))
        .await;
    assert_eq!(missing, Err(Cause::Fail(TodoNotFound { id: 404 })));
    assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
}

struct Garbled;
impl Procedure for Garbled {
    type Group = TodoRpcs;
    const NAME: &'static str = "garbled";
    type Payload = ();
    type Success = Todo;
    type Error = TodoNotFound;
}

struct Unknown;
impl Procedure for Unknown {
    type Group = TodoRpcs;
    const NAME: &'static str = "unknown";
    type Payload = ();
    type Success = Todo;
    type Error = TodoNotFound;
}

#[tokio::test]
async fn test_decode_and_transport_failures_are_defects() {
    let runtime = client(Arc::new(InMemory::default()));

    let garbled = runtime
        .run(rpc_effect::<TodoClient, Garbled>(()))
        .await
        .unwrap_err();
    assert!(matches!(garbled, Cause::Die(Defect::Decode { .. })));

    let unknown = runtime
        .run(rpc_effect::<TodoClient, Unknown>(()))
        .await
        .unwrap_err();
    assert!(matches!(unknown, Cause::Die(Defect::Transport(ref m)) if m.contains("unknown")));
}

#[tokio::test]
async fn test_missing_client_is_a_defect() {
    let runtime = Runtime::new(Context::empty());
    let cause = runtime
        .run(rpc_effect::<TodoClient, GetTodo>(GetTodoPayload { id: 1 }))
        .await
        .unwrap_err();
    assert_eq!(cause, Cause::Die(Defect::missing_service("TodoClient")));
}

#[tokio::test]
async fn test_payload_change_fetches_new_entry() {
    LocalSet::new()
        .run_until(async {
            let transport = Arc::new(InMemory::default());
            let hooks = make_rpc_hooks::<TodoClient>(RuntimeAccessor::fixed(client(
                transport.clone(),
            )));
            let reactive = reactive_root();
            let id = RwSignal::new(1);
            let todo = hooks.use_rpc_query::<GetTodo>(
                move || GetTodoPayload { id: id.get() },
                QuerySettings::new,
            );
            todo.settled().await;
            assert_eq!(todo.data().map(|t| t.id), Some(1));

            id.set(2);
            todo.settled().await;

            assert_eq!(todo.data().map(|t| t.title), Some("todo 2".to_string()));
            assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_declared_error_flows_through_unwrapped() {
    LocalSet::new()
        .run_until(async {
            let runtime = client(Arc::new(InMemory::default()));
            let reactive = reactive_root();
            let todo = rpc_query::<TodoClient, GetTodo>(
                RuntimeAccessor::fixed(runtime),
                || GetTodoPayload { id: 404 },
                || QuerySettings::new().throw_on_defect(true),
            );
            todo.settled().await;

            assert_eq!(
                todo.error(),
                Some(QueryError::Failure(TodoNotFound { id: 404 }))
            );
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_rpc_mutation_forwards_callbacks() {
    LocalSet::new()
        .run_until(async {
            let runtime = client(Arc::new(InMemory::default()));
            let created = Arc::new(AtomicUsize::new(0));
            let reactive = reactive_root();
            let create = {
                let created = created.clone();
                rpc_mutation::<TodoClient, CreateTodo>(RuntimeAccessor::fixed(runtime), move || {
                    let created = created.clone();
                    MutationSettings::new().on_success(move |todo: Todo, _, _| {
                        let created = created.clone();
                        crate::effect::from_fn(move |_: &Context| {
                            created.store(todo.id as usize, Ordering::SeqCst);
                            Ok::<_, TodoNotFound>(())
                        })
                    })
                })
            };

            let exit = create.mutate_async("write tests".to_string()).await;

            assert_eq!(
                exit,
                Exit::Success(Todo {
                    id: 7,
                    title: "write tests".into()
                })
            );
            assert_eq!(created.load(Ordering::SeqCst), 7);
            assert_eq!(create.key(), Some(query_key!["createTodo"]));
            reactive.dispose();
        })
        .await;
}

#[tokio::test]
async fn test_unkeyable_payloads_fail_without_sharing_an_entry() {
    LocalSet::new()
        .run_until(async {
            let transport = Arc::new(InMemory::default());
            let hooks = make_rpc_hooks::<TodoClient>(RuntimeAccessor::fixed(client(
                transport.clone(),
            )));
            let reactive = reactive_root();
            let first = hooks.use_rpc_query::<TagCounts>(
                || BTreeMap::from([((1, 2), 1)]),
                QuerySettings::new,
            );
            let second = hooks.use_rpc_query::<TagCounts>(
                || BTreeMap::from([((3, 4), 9)]),
                QuerySettings::new,
            );
            first.settled().await;
            second.settled().await;

            assert_ne!(first.key(), second.key());
            for query in [&first, &second] {
                let cause = query.error().and_then(|e| e.cause().cloned());
                assert!(matches!(
                    cause,
                    Some(Cause::Die(Defect::Decode { ref what, .. })) if what == "tagCounts payload"
                ));
            }
            assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
            reactive.dispose();
        })
        .await;
}
