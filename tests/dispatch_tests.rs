//! Dispatch loop behavior over a scripted backend.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map};

use common::{constant_capability, context, registry_with, usage, ScriptedAdapter};
use omni::agent::{Assistant, Session};
use omni::agent_loop::{DispatchLoop, RunStatus};
use omni::error::OmniError;
use omni::provider::BackendFamily;
use omni::tools::builtin::create_folder_tool;
use omni::tools::{PluginEntry, StaticSource, ToolRegistry};
use omni::types::{Message, Role, ToolInvocationRequest, Turn, UserInput};
use omni::util::retry::RetryPolicy;

fn dispatch(adapter: ScriptedAdapter, registry: ToolRegistry) -> DispatchLoop {
    DispatchLoop::new(Box::new(adapter), registry)
}

#[tokio::test]
async fn reset_clears_history_without_calling_backend() {
    let adapter = ScriptedAdapter::new(BackendFamily::Structured);
    let log = adapter.log();
    let mut dispatch = dispatch(adapter, registry_with(BackendFamily::Structured, vec![]).await);

    let mut session = Session::new();
    for i in 0..5 {
        session.push(Message::user(format!("message {i}")));
    }
    session.record_usage(&usage(120));

    let outcome = dispatch
        .run(&mut session, UserInput::text("  RESET "))
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Command);
    assert_eq!(outcome.response, "Conversation reset!");
    assert!(session.is_empty());
    assert_eq!(session.total_tokens(), 0);
    assert_eq!(log.calls(), 0);
}

#[tokio::test]
async fn quit_is_acknowledged_locally() {
    let adapter = ScriptedAdapter::new(BackendFamily::Tagged);
    let log = adapter.log();
    let mut dispatch = dispatch(adapter, registry_with(BackendFamily::Tagged, vec![]).await);
    let mut session = Session::new();

    let outcome = dispatch.run(&mut session, "quit".into()).await.unwrap();

    assert_eq!(outcome.response, "Goodbye!");
    assert!(session.is_empty());
    assert_eq!(log.calls(), 0);
}

#[tokio::test]
async fn refresh_lists_new_capabilities() {
    let source = Arc::new(StaticSource::new(vec![PluginEntry::from_capability(
        constant_capability("first", "1"),
    )]));
    let mut registry = ToolRegistry::new(context(BackendFamily::Structured), source.clone());
    registry.load().await.unwrap();

    let adapter = ScriptedAdapter::new(BackendFamily::Structured);
    let log = adapter.log();
    let mut dispatch = dispatch(adapter, registry);
    let mut session = Session::new();

    source.push(PluginEntry::from_capability(constant_capability("second", "2")));
    let outcome = dispatch.run(&mut session, "refresh".into()).await.unwrap();

    assert_eq!(
        outcome.response,
        "Tools refreshed successfully!\nNew tools: second"
    );
    assert_eq!(dispatch.registry().len(), 2);
    assert_eq!(log.calls(), 0);
}

#[tokio::test]
async fn folder_conflict_is_reported_and_loop_continues() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("notes");
    std::fs::write(&target, "not a folder").unwrap();
    let target = target.to_string_lossy().to_string();

    let adapter = ScriptedAdapter::new(BackendFamily::Structured)
        .then_call("create_folder", json!({ "path": target }))
        .then_text("That path is already a file.");
    let log = adapter.log();
    let registry = registry_with(BackendFamily::Structured, vec![create_folder_tool()]).await;
    let mut dispatch = dispatch(adapter, registry);
    let mut session = Session::new();

    let outcome = dispatch
        .run(&mut session, "Create a folder named notes".into())
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.response, "That path is already a file.");
    assert_eq!(outcome.rounds, 2);
    assert_eq!(log.calls(), 2);

    let roles: Vec<Role> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
    );
    let result = session.messages()[2].tool_result_part().unwrap();
    assert!(result.is_error);
    assert!(result.output.contains("Path conflict"));
    assert!(std::path::Path::new(&target).is_file());
}

#[tokio::test]
async fn unknown_capability_becomes_error_result() {
    let adapter = ScriptedAdapter::new(BackendFamily::Tagged)
        .then_call("teleport", json!({}))
        .then_text("I can't do that.");
    let log = adapter.log();
    let mut dispatch = dispatch(adapter, registry_with(BackendFamily::Tagged, vec![]).await);
    let mut session = Session::new();

    let outcome = dispatch.run(&mut session, "beam me up".into()).await.unwrap();

    assert_eq!(outcome.response, "I can't do that.");
    let second_call = &log.seen()[1];
    let result = second_call.last().unwrap().tool_result_part().unwrap();
    assert!(result.is_error);
    assert_eq!(result.output, "Tool teleport not found");
}

/// The tool message the backend sees on its second call, per family.
async fn round_trip_tool_message(family: BackendFamily) -> (String, bool, Message) {
    let adapter = ScriptedAdapter::new(family)
        .then_call("x", json!({}))
        .then_text("done");
    let log = adapter.log();
    let registry = registry_with(family, vec![constant_capability("x", "X")]).await;
    let mut dispatch = dispatch(adapter, registry);
    let mut session = Session::new();

    dispatch.run(&mut session, "call x".into()).await.unwrap();

    let seen = log.seen();
    assert_eq!(seen.len(), 2);
    let tool_message = seen[1].last().unwrap().clone();
    let result = tool_message.tool_result_part().unwrap();
    assert_eq!(result.call_id, seen[1][1].tool_calls()[0].call_id);
    (result.output.clone(), result.is_error, tool_message)
}

#[tokio::test]
async fn capability_output_is_identical_across_families() {
    let (structured, structured_err, structured_msg) =
        round_trip_tool_message(BackendFamily::Structured).await;
    let (tagged, tagged_err, tagged_msg) = round_trip_tool_message(BackendFamily::Tagged).await;

    assert_eq!(structured, "X");
    assert_eq!(tagged, "X");
    assert!(!structured_err && !tagged_err);
    assert_eq!(structured_msg.role, Role::Tool);
    assert_eq!(tagged_msg.role, Role::Tool);
}

#[tokio::test]
async fn assistant_text_attaches_to_first_invocation_only() {
    let first = ToolInvocationRequest::new("a", "x", Map::new());
    let second = ToolInvocationRequest::new("b", "x", Map::new());
    let adapter = ScriptedAdapter::new(BackendFamily::Structured)
        .then(Ok(Turn::with_invocations("Working on it", vec![first, second])))
        .then_text("finished");
    let registry = registry_with(BackendFamily::Structured, vec![constant_capability("x", "X")]).await;
    let mut dispatch = dispatch(adapter, registry);
    let mut session = Session::new();

    let outcome = dispatch.run(&mut session, "go".into()).await.unwrap();
    assert_eq!(outcome.rounds, 2);

    let messages = session.messages();
    assert_eq!(messages.len(), 6);
    assert_eq!(messages[1].text(), "Working on it");
    assert_eq!(messages[1].tool_calls()[0].call_id, "a");
    assert_eq!(messages[2].call_id(), Some("a"));
    assert_eq!(messages[3].text(), "");
    assert_eq!(messages[3].tool_calls()[0].call_id, "b");
    assert_eq!(messages[4].call_id(), Some("b"));
    assert_eq!(messages[5].text(), "finished");
}

#[tokio::test]
async fn structured_usage_accumulates() {
    let call = ToolInvocationRequest::new("a", "x", Map::new());
    let adapter = ScriptedAdapter::new(BackendFamily::Structured)
        .then(Ok(Turn::with_invocations("", vec![call]).with_usage(Some(usage(50)))))
        .then(Ok(Turn::final_text("ok").with_usage(Some(usage(30)))));
    let registry = registry_with(BackendFamily::Structured, vec![constant_capability("x", "X")]).await;
    let mut dispatch = dispatch(adapter, registry);
    let mut session = Session::new();

    dispatch.run(&mut session, "go".into()).await.unwrap();
    assert_eq!(session.total_tokens(), 80);
}

#[tokio::test]
async fn tagged_turns_leave_usage_unchanged() {
    let adapter = ScriptedAdapter::new(BackendFamily::Tagged)
        .then_call("x", json!({}))
        .then_text("ok");
    let registry = registry_with(BackendFamily::Tagged, vec![constant_capability("x", "X")]).await;
    let mut dispatch = dispatch(adapter, registry);
    let mut session = Session::new();
    session.record_usage(&usage(10));

    dispatch.run(&mut session, "go".into()).await.unwrap();
    assert_eq!(session.total_tokens(), 10);
}

#[tokio::test]
async fn terminal_error_turn_ends_the_run() {
    let adapter = ScriptedAdapter::new(BackendFamily::Tagged).then(Ok(Turn::failed(
        "<tool_calls>{oops}</tool_calls>",
        "Invalid tool call format - expected value",
    )));
    let log = adapter.log();
    let mut dispatch = dispatch(adapter, registry_with(BackendFamily::Tagged, vec![]).await);
    let mut session = Session::new();

    let outcome = dispatch.run(&mut session, "go".into()).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(
        outcome.response,
        "Error: Invalid tool call format - expected value"
    );
    assert_eq!(log.calls(), 1);
    assert_eq!(session.len(), 1);
    assert_eq!(session.messages()[0].role, Role::User);
}

#[tokio::test]
async fn adapter_error_propagates_from_run() {
    let adapter = ScriptedAdapter::new(BackendFamily::Structured)
        .then(Err(OmniError::Authentication("bad key".into())));
    let log = adapter.log();
    let mut dispatch = dispatch(adapter, registry_with(BackendFamily::Structured, vec![]).await);
    let mut session = Session::new();

    let err = dispatch.run(&mut session, "hi".into()).await.unwrap_err();

    assert!(matches!(err, OmniError::Authentication(_)));
    assert_eq!(log.calls(), 1);
    assert_eq!(session.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn retryable_backend_error_is_retried() {
    let adapter = ScriptedAdapter::new(BackendFamily::Structured)
        .then(Err(OmniError::api(503, "unavailable")))
        .then_text("ok");
    let log = adapter.log();
    let mut dispatch = dispatch(adapter, registry_with(BackendFamily::Structured, vec![]).await)
        .with_retry(RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(10),
            ..Default::default()
        });
    let mut session = Session::new();

    let outcome = dispatch.run(&mut session, "hi".into()).await.unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.response, "ok");
    assert_eq!(log.calls(), 2);
    assert_eq!(session.len(), 2);
}

#[tokio::test]
async fn tool_usage_display_does_not_change_the_run() {
    let adapter = ScriptedAdapter::new(BackendFamily::Tagged)
        .then_call("x", json!({"path": "notes"}))
        .then_text("done");
    let registry = registry_with(BackendFamily::Tagged, vec![constant_capability("x", "X")]).await;
    let mut dispatch = dispatch(adapter, registry).with_tool_usage_display(true);
    let mut session = Session::new();

    let outcome = dispatch.run(&mut session, "go".into()).await.unwrap();

    assert_eq!(outcome.response, "done");
    assert_eq!(outcome.rounds, 2);
    let result = session.messages()[2].tool_result_part().unwrap();
    assert_eq!(result.output, "X");
}

#[tokio::test]
async fn assistant_send_renders_errors() {
    let adapter = ScriptedAdapter::new(BackendFamily::Structured)
        .then(Err(OmniError::Authentication("bad key".into())))
        .then_text("hello again");
    let registry = registry_with(BackendFamily::Structured, vec![]).await;
    let mut assistant = Assistant::new(dispatch(adapter, registry), Session::new());

    assert_eq!(
        assistant.send("hi").await,
        "Error: Authentication failure: bad key"
    );
    assert_eq!(assistant.send("hi again").await, "hello again");
    assert_eq!(assistant.session().len(), 3);

    assistant.reset();
    assert!(assistant.session().is_empty());
}

#[tokio::test]
async fn assistant_lists_and_describes() {
    let adapter = ScriptedAdapter::new(BackendFamily::Structured);
    let registry = registry_with(
        BackendFamily::Structured,
        vec![constant_capability("a", "1"), constant_capability("b", "2")],
    )
    .await;
    let mut assistant = Assistant::new(dispatch(adapter, registry), Session::new());

    assert_eq!(assistant.list_capabilities(), vec!["a", "b"]);
    assert_eq!(assistant.describe_next_request(), json!({"messages": 0}));
    assert!(assistant.refresh().await.unwrap().is_unchanged());
}
