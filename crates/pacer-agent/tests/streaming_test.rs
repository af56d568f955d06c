//! Streaming coordinator tests.

use std::time::Duration;

use pacer_agent::tools::default_registry;
use pacer_agent::{OrchestratorConfig, StreamingCoordinator};
use pacer_core::{ChatRequest, ChatResponse, ConversationDelegate, Error, MessageLifecycle};
use pacer_testing::{DelegateEvent, RecordingDelegate, ScriptedBackend, StreamScript};

fn request(delegate: &RecordingDelegate) -> ChatRequest {
    ChatRequest::from_history("test-key", "test-model", "You are a coach.", &delegate.history())
}

fn visible_contents(delegate: &RecordingDelegate) -> Vec<String> {
    delegate
        .events()
        .into_iter()
        .filter_map(|e| match e {
            DelegateEvent::Created { content, .. } | DelegateEvent::Updated { content, .. } => {
                Some(content)
            }
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn scenario_a_tool_syntax_never_reaches_visible_message() {
    let text = "Sure, let's plan. [TOOL_CALL: plan_workout(date: \"today\", workout_json: \"{...}\")]";
    let backend = ScriptedBackend::new().with_stream(StreamScript::new().chars(text));
    let delegate = RecordingDelegate::with_user("row 5k");
    let registry = default_registry();
    let config = OrchestratorConfig::default();

    let outcome = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .run(request(&delegate))
        .await
        .unwrap();

    let index = outcome.state.message_index().expect("message created");
    assert_eq!(delegate.messages()[index].content, "Sure, let's plan. ");
    assert_eq!(delegate.detected_count("plan_workout"), 1);
    for content in visible_contents(&delegate) {
        assert!(!content.contains('['), "leaked tool syntax: {:?}", content);
    }

    assert_eq!(outcome.state.content(), text);
    assert!(outcome.state.is_complete());
    assert_eq!(outcome.detected_tool.unwrap().name, "plan_workout");
    assert!(!outcome.cancelled);
}

#[tokio::test(start_paused = true)]
async fn latch_reports_a_detected_call_once() {
    let backend = ScriptedBackend::new().with_stream(StreamScript::new().tokens([
        "Checking. [TOOL_CALL: get_",
        "schedule]",
        " and again [TOOL_CALL: get_schedule]",
        " [TOOL_CALL: delete_workout(date: \"today\")]",
    ]));
    let delegate = RecordingDelegate::with_user("what's on my plan?");
    let registry = default_registry();
    let config = OrchestratorConfig::default();

    let outcome = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .run(request(&delegate))
        .await
        .unwrap();

    assert_eq!(delegate.detected_count("get_schedule"), 1);
    assert_eq!(delegate.detected_count("delete_workout"), 0);
    assert_eq!(delegate.last_assistant().unwrap().content, "Checking. ");
    // Everything after the first call is still in the raw content.
    assert!(outcome.state.content().ends_with("(date: \"today\")]"));
}

#[tokio::test(start_paused = true)]
async fn plain_brackets_are_released() {
    let backend = ScriptedBackend::new()
        .with_stream(StreamScript::new().chars("Pace: [easy] then [TOOL"));
    let delegate = RecordingDelegate::with_user("pace?");
    let registry = default_registry();
    let config = OrchestratorConfig::default();

    let outcome = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .run(request(&delegate))
        .await
        .unwrap();

    // Never completed, so the held prefix is shown at the end.
    assert_eq!(delegate.last_assistant().unwrap().content, "Pace: [easy] then [TOOL");
    assert!(outcome.detected_tool.is_none());
}

#[tokio::test(start_paused = true)]
async fn released_text_is_never_withdrawn() {
    let filler = "x".repeat(80);
    let shown = format!("[TOOL_CALL: a({} [TOOL_CALL: b", filler);
    let backend = ScriptedBackend::new().with_stream(StreamScript::new().tokens([
        "[TOOL_CALL: a(".to_string(),
        format!("{} [TOOL_CALL: b", filler),
        "]".to_string(),
    ]));
    let delegate = RecordingDelegate::with_user("go");
    let registry = default_registry();
    let config = OrchestratorConfig {
        detection_buffer_chars: 64,
        ..OrchestratorConfig::default()
    };

    let outcome = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .run(request(&delegate))
        .await
        .unwrap();

    assert_eq!(delegate.detected_count("b"), 1);
    let contents = visible_contents(&delegate);
    for pair in contents.windows(2) {
        assert!(pair[1].starts_with(&pair[0]), "{:?} -> {:?}", pair[0], pair[1]);
    }
    let index = outcome.state.message_index().unwrap();
    assert_eq!(delegate.messages()[index].content, shown);
}

#[tokio::test(start_paused = true)]
async fn updates_are_batched() {
    let words: Vec<String> = (0..40).map(|i| format!("w{} ", i)).collect();
    let backend = ScriptedBackend::new().with_stream(
        StreamScript::new()
            .tokens(words.clone())
            .with_token_delay(Duration::from_millis(5)),
    );
    let delegate = RecordingDelegate::with_user("long answer please");
    let registry = default_registry();
    let config = OrchestratorConfig::default();

    let outcome = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .run(request(&delegate))
        .await
        .unwrap();

    let index = outcome.state.message_index().unwrap();
    assert_eq!(delegate.create_count(), 1);
    // 40 tokens over 200ms at a 50ms cadence, plus the final flush.
    assert!(delegate.update_count() <= 6, "{} updates", delegate.update_count());
    assert_eq!(delegate.messages()[index].content, words.concat());
    assert_eq!(delegate.updates_for(index).last().unwrap(), &words.concat());
}

#[tokio::test(start_paused = true)]
async fn reasoning_is_tracked_and_previewed() {
    let backend = ScriptedBackend::new().with_stream(
        StreamScript::new()
            .reasoning("Thinking about ")
            .reasoning("pace")
            .content("Go easy."),
    );
    let delegate = RecordingDelegate::with_user("how fast?");
    let registry = default_registry();
    let config = OrchestratorConfig::default();

    let outcome = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .run(request(&delegate))
        .await
        .unwrap();

    assert_eq!(outcome.state.reasoning(), Some("Thinking about pace"));
    let message = delegate.last_assistant().unwrap();
    assert_eq!(message.reasoning.as_deref(), Some("Thinking about pace"));
    assert_eq!(message.content, "Go easy.");
    assert_eq!(message.lifecycle, MessageLifecycle::Streaming);

    let reasoning: Vec<_> = delegate
        .events()
        .into_iter()
        .filter(|e| matches!(e, DelegateEvent::Reasoning { .. }))
        .collect();
    assert_eq!(
        reasoning,
        vec![
            DelegateEvent::Reasoning {
                is_streaming: true,
                chunk: Some("Thinking about ".to_string())
            },
            DelegateEvent::Reasoning {
                is_streaming: true,
                chunk: Some("pace".to_string())
            },
            DelegateEvent::Reasoning {
                is_streaming: false,
                chunk: None
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn completed_aggregate_wins_over_tokens() {
    let backend = ScriptedBackend::new().with_stream(
        StreamScript::new()
            .content("Run 5k")
            .completed(ChatResponse::new("Run 5k at an easy pace.").with_reasoning("short")),
    );
    let delegate = RecordingDelegate::with_user("plan");
    let registry = default_registry();
    let config = OrchestratorConfig::default();

    let outcome = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .run(request(&delegate))
        .await
        .unwrap();

    assert_eq!(outcome.state.content(), "Run 5k at an easy pace.");
    assert_eq!(outcome.state.reasoning(), Some("short"));
}

#[tokio::test(start_paused = true)]
async fn failure_reports_created_message() {
    let backend = ScriptedBackend::new()
        .with_stream(StreamScript::new().content("Hel").fail("connection reset"));
    let delegate = RecordingDelegate::with_user("hi");
    let registry = default_registry();
    let config = OrchestratorConfig::default();

    let failure = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .run(request(&delegate))
        .await
        .unwrap_err();

    assert_eq!(failure.message_index, Some(1));
    assert!(matches!(failure.source, Error::Llm(_)));
}

#[tokio::test(start_paused = true)]
async fn failure_to_open_has_no_message() {
    let backend = ScriptedBackend::new().with_stream(StreamScript::fail_to_open("offline"));
    let delegate = RecordingDelegate::with_user("hi");
    let registry = default_registry();
    let config = OrchestratorConfig::default();

    let failure = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .run(request(&delegate))
        .await
        .unwrap_err();

    assert_eq!(failure.message_index, None);
    assert_eq!(delegate.create_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn interrupt_stops_the_stream() {
    let backend = ScriptedBackend::new().with_stream(
        StreamScript::new()
            .tokens(["Easy ", "run ", "today."])
            .with_token_delay(Duration::from_millis(20)),
    );
    let delegate = RecordingDelegate::with_user("plan");
    let registry = default_registry();
    let config = OrchestratorConfig::default();
    let (tx, rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        let _ = tx.send(true);
    });

    let outcome = StreamingCoordinator::new(&backend, &delegate, &registry, &config)
        .with_interrupt_signal(Some(rx))
        .run(request(&delegate))
        .await
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.state.content(), "Easy ");
}
