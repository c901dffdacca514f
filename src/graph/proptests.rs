//! Property-based tests for the workflow graph

use super::*;
use crate::llm::{ContentBlock, LlmErrorKind, Usage};
use crate::tools::ToolOutput;
use proptest::prelude::*;
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Generators
// ============================================================================

fn arb_error_kind() -> impl Strategy<Value = LlmErrorKind> {
    prop_oneof![
        Just(LlmErrorKind::Network),
        Just(LlmErrorKind::RateLimit),
        Just(LlmErrorKind::ServerError),
        Just(LlmErrorKind::Auth),
        Just(LlmErrorKind::InvalidRequest),
        Just(LlmErrorKind::Unknown),
    ]
}

fn arb_tool_name() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("check_gcp_logs".to_string()),
        Just("check_gcp_traces".to_string()),
        Just("query_github_file".to_string()),
        Just("send_slack_alert".to_string()),
        "[a-z_]{3,12}",
    ]
}

fn arb_block() -> impl Strategy<Value = ContentBlock> {
    prop_oneof![
        "[a-zA-Z .]{0,40}".prop_map(ContentBlock::text),
        ("[a-z0-9_]{4,10}", arb_tool_name())
            .prop_map(|(id, name)| ContentBlock::tool_use(id, name, json!({}))),
    ]
}

fn arb_content() -> impl Strategy<Value = Vec<ContentBlock>> {
    proptest::collection::vec(arb_block(), 0..5)
}

fn arb_state() -> impl Strategy<Value = GraphState> {
    prop_oneof![
        Just(GraphState::Idle),
        Just(GraphState::Done),
        "[a-z ]{1,20}".prop_map(|message| GraphState::Failed { message }),
        (1u32..6, 1u32..30).prop_map(|(attempt, step)| GraphState::CallingModel { attempt, step }),
        (proptest::collection::vec(("[a-z]{4}", arb_tool_name()), 1..4), 1u32..30).prop_map(
            |(calls, step)| GraphState::RunningTools {
                pending: calls
                    .into_iter()
                    .map(|(id, name)| ToolCall::new(id, name, json!({})))
                    .collect(),
                step,
            }
        ),
    ]
}

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        "[a-z ]{1,20}".prop_map(|text| Event::UserMessage { text }),
        arb_content().prop_map(|content| Event::ModelResponse {
            content,
            usage: Usage::default(),
        }),
        (arb_error_kind(), proptest::option::of(0u64..120)).prop_map(|(kind, secs)| {
            Event::ModelError {
                kind,
                message: "error".to_string(),
                retry_after: secs.map(Duration::from_secs),
            }
        }),
        (1u32..6).prop_map(|attempt| Event::RetryElapsed { attempt }),
        Just(Event::ToolsComplete { results: vec![] }),
    ]
}

/// Results answering every pending call of a tools state
fn results_for(state: &GraphState) -> Vec<ToolResult> {
    match state {
        GraphState::RunningTools { pending, .. } => pending
            .iter()
            .map(|call| ToolResult::new(call, ToolOutput::success("ok")))
            .collect(),
        _ => vec![],
    }
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_transition_is_deterministic(state in arb_state(), event in arb_event()) {
        let ctx = GraphContext::new("conv", 25);
        let first = transition(&state, &ctx, event.clone());
        let second = transition(&state, &ctx, event);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_busy_states_reject_user_messages(state in arb_state(), text in "[a-z]{1,10}") {
        let ctx = GraphContext::new("conv", 25);
        let result = transition(&state, &ctx, Event::UserMessage { text });
        if state.is_busy() {
            prop_assert_eq!(result.unwrap_err(), TransitionError::AgentBusy);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    #[test]
    fn prop_routes_to_tools_iff_tool_use(content in arb_content()) {
        let has_tool_use = content.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }));
        prop_assert_eq!(should_continue(&content) == Route::Tools, has_tool_use);

        let ctx = GraphContext::new("conv", 25);
        let result = transition(
            &GraphState::CallingModel { attempt: 1, step: 1 },
            &ctx,
            Event::ModelResponse { content, usage: Usage::default() },
        ).unwrap();
        if has_tool_use {
            let is_running_tools = matches!(result.new_state, GraphState::RunningTools { .. });
            prop_assert!(is_running_tools);
        } else {
            prop_assert_eq!(result.new_state, GraphState::Done);
        }
    }

    #[test]
    fn prop_step_never_exceeds_limit(
        max_steps in 1u32..12,
        replies in proptest::collection::vec(arb_content(), 1..30),
    ) {
        let ctx = GraphContext::new("conv", max_steps);
        let mut state = transition(&GraphState::Idle, &ctx, Event::UserMessage { text: "check".into() })
            .unwrap()
            .new_state;

        for content in replies {
            if state.is_finished() {
                break;
            }
            let event = match &state {
                GraphState::CallingModel { .. } => Event::ModelResponse { content, usage: Usage::default() },
                GraphState::RunningTools { .. } => Event::ToolsComplete { results: results_for(&state) },
                other => return Err(TestCaseError::fail(format!("unexpected state {other:?}"))),
            };
            state = transition(&state, &ctx, event).unwrap().new_state;
            prop_assert!(state.step() <= max_steps);
        }
    }

    #[test]
    fn prop_tool_loop_always_terminates(max_steps in 1u32..40) {
        let ctx = GraphContext::new("conv", max_steps);
        let reply = vec![ContentBlock::tool_use("c1", "check_gcp_logs", json!({}))];
        let mut state = transition(&GraphState::Idle, &ctx, Event::UserMessage { text: "check".into() })
            .unwrap()
            .new_state;

        let mut transitions = 0;
        while !state.is_finished() {
            let event = match &state {
                GraphState::CallingModel { .. } => Event::ModelResponse { content: reply.clone(), usage: Usage::default() },
                _ => Event::ToolsComplete { results: results_for(&state) },
            };
            state = transition(&state, &ctx, event).unwrap().new_state;
            transitions += 1;
            prop_assert!(transitions <= max_steps);
        }
        let is_recursion_failure = matches!(&state, GraphState::Failed { message } if message.starts_with("Recursion limit"));
        prop_assert!(is_recursion_failure);
    }

    #[test]
    fn prop_retries_are_bounded(kinds in proptest::collection::vec(arb_error_kind(), 1..10)) {
        let ctx = GraphContext::new("conv", 25);
        let mut state = GraphState::CallingModel { attempt: 1, step: 1 };

        for kind in kinds {
            let result = transition(&state, &ctx, Event::ModelError {
                kind,
                message: "error".into(),
                retry_after: None,
            }).unwrap();
            state = result.new_state;

            match &state {
                GraphState::CallingModel { attempt, .. } => {
                    prop_assert!(*attempt <= MAX_RETRIES + 1);
                    let retry = transition(&state, &ctx, Event::RetryElapsed { attempt: *attempt }).unwrap();
                    prop_assert_eq!(retry.effects, vec![Effect::RequestModel]);
                }
                GraphState::Failed { .. } => break,
                other => return Err(TestCaseError::fail(format!("unexpected state {other:?}"))),
            }
        }
    }

    #[test]
    fn prop_retry_delay_bounded(retry in 1u32..100, server in proptest::option::of(0u64..10_000)) {
        let delay = retry_delay(retry, server.map(Duration::from_millis));
        prop_assert!(delay >= Duration::from_secs(1));
        prop_assert!(delay <= MAX_RETRY_DELAY);
    }
}
