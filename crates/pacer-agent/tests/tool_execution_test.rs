//! Tool execution coordinator tests.

use pacer_agent::agent::tool_parser::normalize_whitespace;
use pacer_agent::tools::default_registry;
use pacer_agent::{contains_tool_call, ResponseState, ToolExecution, ToolExecutionCoordinator};
use pacer_core::{ConversationDelegate, Message, MessageLifecycle, MessageRole};
use pacer_testing::RecordingDelegate;

fn state(content: &str) -> ResponseState {
    ResponseState::completed(content, None)
}

#[tokio::test]
async fn cleaned_response_never_contains_tool_syntax() {
    let inputs = [
        "[TOOL_CALL: get_schedule]",
        "Sure. [TOOL_CALL: get_schedule] And [TOOL_CALL: get_schedule(date: \"today\")]",
        "[TOOL_CALL: plan_workout(date: \"today\", workout_json: \"{\"type\": \"easy\"}\")]\n\nDone.",
        "Mixed [TOOL_CALL: unknown_tool] text [TOOL_CALL: delete_workout(date: \"2024-01-01\")]",
        "[TOOL_CALL: a[TOOL_CALL: get_schedule]]",
        "[TOOL_CALL: [TOOL_CALL: get_schedule] get_schedule]",
    ];
    let registry = default_registry();

    for input in inputs {
        let delegate = RecordingDelegate::with_user("go");
        let execution = ToolExecutionCoordinator::new(&registry, &delegate)
            .process(&state(input))
            .await
            .unwrap();
        assert!(execution.has_tools(), "{}", input);
        assert!(!contains_tool_call(execution.cleaned_response()), "{}", input);
    }
}

#[tokio::test]
async fn plain_text_passes_through() {
    let inputs = ["Run easy today.", "  Long run Sunday.\n\n\n\nRest Monday.  ", "[not a tool] fine"];
    let registry = default_registry();

    for input in inputs {
        let delegate = RecordingDelegate::with_user("go");
        let execution = ToolExecutionCoordinator::new(&registry, &delegate)
            .process(&state(input))
            .await
            .unwrap();
        assert!(!execution.has_tools());
        assert_eq!(execution.cleaned_response(), normalize_whitespace(input));
        assert!(delegate.started_tools().is_empty());
    }
}

#[tokio::test]
async fn results_keep_call_order_and_failures() {
    let registry = default_registry();
    let delegate = RecordingDelegate::with_user("go");
    let execution = ToolExecutionCoordinator::new(&registry, &delegate)
        .process(&state(
            "[TOOL_CALL: teleport] [TOOL_CALL: get_schedule] [TOOL_CALL: delete_workout]",
        ))
        .await
        .unwrap();

    let results = execution.results();
    let names: Vec<_> = results.iter().map(|r| r.tool_name.as_str()).collect();
    assert_eq!(names, vec!["teleport", "get_schedule", "delete_workout"]);
    assert!(!results[0].success);
    assert_eq!(results[0].error_text.as_deref(), Some("Unknown tool: teleport"));
    assert!(results[1].success);
    assert!(!results[2].success);

    let system = execution.system_message().unwrap();
    assert_eq!(system.role, MessageRole::System);
    assert!(system.content.starts_with("Tool results:\n[teleport] failed: Unknown tool: teleport"));
    assert_eq!(
        delegate.started_tools(),
        vec!["teleport", "get_schedule", "delete_workout"]
    );
}

#[tokio::test]
async fn visible_message_is_rewritten_and_completed() {
    let registry = default_registry();
    let delegate = RecordingDelegate::with_user("go");
    let index = delegate
        .create_message(Message::assistant_streaming("Let me check. ", Some("hmm".to_string())))
        .unwrap();

    let mut response = state("Let me check. [TOOL_CALL: get_schedule]");
    response.set_message_index(index);
    let execution = ToolExecutionCoordinator::new(&registry, &delegate)
        .process(&response)
        .await
        .unwrap();

    assert!(matches!(execution, ToolExecution::Executed { .. }));
    let message = delegate.message(index).unwrap();
    assert_eq!(message.content, "Let me check.");
    assert_eq!(message.reasoning.as_deref(), Some("hmm"));
    assert_eq!(message.lifecycle, MessageLifecycle::Completed);
}

#[tokio::test]
async fn tool_only_reply_is_completed_with_its_reasoning() {
    let registry = default_registry();
    let delegate = RecordingDelegate::with_user("what's my week?");
    let index = delegate
        .create_message(Message::assistant_streaming("", Some("need schedule".to_string())))
        .unwrap();

    let mut response = ResponseState::completed(
        "[TOOL_CALL: get_schedule]",
        Some("need schedule".to_string()),
    );
    response.set_message_index(index);
    let execution = ToolExecutionCoordinator::new(&registry, &delegate)
        .process(&response)
        .await
        .unwrap();

    assert!(execution.has_tools());
    assert_eq!(execution.cleaned_response(), "");
    let message = delegate.message(index).unwrap();
    assert_eq!(message.content, "");
    assert_eq!(message.reasoning.as_deref(), Some("need schedule"));
    assert_eq!(message.lifecycle, MessageLifecycle::Completed);
}

#[tokio::test]
async fn missing_message_index_is_an_error() {
    let registry = default_registry();
    let delegate = RecordingDelegate::with_user("go");
    let mut response = state("Checking. [TOOL_CALL: get_schedule]");
    response.set_message_index(7);

    let err = ToolExecutionCoordinator::new(&registry, &delegate)
        .process(&response)
        .await
        .unwrap_err();
    assert!(matches!(err, pacer_core::Error::MessageNotFound(7)));
}
