//! Pure state transition function

use super::{Effect, Event, GraphContext, GraphState, Notification, ToolCall};
use crate::llm::{ContentBlock, LlmMessage, MessageRole};
use std::time::Duration;
use thiserror::Error;

/// Retries after the first failed model call
pub const MAX_RETRIES: u32 = 3;

pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Edge taken after the agent node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Tools,
    End,
}

/// Route to the tools node when the model reply requests any tool
pub fn should_continue(content: &[ContentBlock]) -> Route {
    if content
        .iter()
        .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    {
        Route::Tools
    } else {
        Route::End
    }
}

/// Result of a state transition
#[derive(Debug, PartialEq)]
pub struct TransitionResult {
    pub new_state: GraphState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: GraphState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Agent is busy, wait for the current turn to finish")]
    AgentBusy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function: no I/O, same inputs give the same outputs.
pub fn transition(
    state: &GraphState,
    ctx: &GraphContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // New turn
        (GraphState::Idle | GraphState::Done | GraphState::Failed { .. }, Event::UserMessage { text }) => {
            Ok(enter_node(
                ctx,
                1,
                GraphState::CallingModel { attempt: 1, step: 1 },
                vec![Effect::append(LlmMessage::user(text))],
                Effect::RequestModel,
            ))
        }

        (GraphState::CallingModel { .. } | GraphState::RunningTools { .. }, Event::UserMessage { .. }) => {
            Err(TransitionError::AgentBusy)
        }

        // Agent node finished
        (GraphState::CallingModel { step, .. }, Event::ModelResponse { content, .. }) => {
            match should_continue(&content) {
                Route::End => Ok(TransitionResult::new(GraphState::Done)
                    .with_effect(Effect::append(LlmMessage::assistant(content)))
                    .with_effect(Effect::notify_done())),
                Route::Tools => {
                    let calls = ToolCall::extract(&content);
                    let next = step + 1;
                    Ok(enter_node(
                        ctx,
                        next,
                        GraphState::RunningTools {
                            pending: calls.clone(),
                            step: next,
                        },
                        vec![Effect::append(LlmMessage::assistant(content))],
                        Effect::ExecuteTools { calls },
                    ))
                }
            }
        }

        (
            GraphState::CallingModel { attempt, step },
            Event::ModelError {
                kind,
                message,
                retry_after,
            },
        ) if kind.is_retryable() && *attempt <= MAX_RETRIES => {
            let retry = *attempt;
            let delay = retry_delay(retry, retry_after);
            let next_attempt = attempt + 1;
            Ok(TransitionResult::new(GraphState::CallingModel {
                attempt: next_attempt,
                step: *step,
            })
            .with_effect(Effect::ScheduleRetry {
                delay,
                attempt: next_attempt,
            })
            .with_effect(Effect::Notify(Notification::Retrying {
                attempt: next_attempt,
                delay,
                message: format!(
                    "{message} (retry {retry} of {MAX_RETRIES} in {}s)",
                    delay.as_secs()
                ),
            })))
        }

        (GraphState::CallingModel { attempt, .. }, Event::ModelError { kind, message, .. }) => {
            let message = if kind.is_retryable() {
                format!("Failed after {attempt} attempts: {message}")
            } else {
                message
            };
            Ok(TransitionResult::new(GraphState::Failed {
                message: message.clone(),
            })
            .with_effect(Effect::notify_failed(message)))
        }

        (GraphState::CallingModel { attempt, step }, Event::RetryElapsed { attempt: elapsed })
            if *attempt == elapsed =>
        {
            Ok(TransitionResult::new(GraphState::CallingModel {
                attempt: *attempt,
                step: *step,
            })
            .with_effect(Effect::RequestModel))
        }

        // Tools node finished, always back to the agent
        (GraphState::RunningTools { pending, step }, Event::ToolsComplete { results }) => {
            let matches_pending = results.len() == pending.len()
                && results
                    .iter()
                    .zip(pending)
                    .all(|(result, call)| result.tool_use_id == call.id);
            if !matches_pending {
                return Err(TransitionError::InvalidTransition(format!(
                    "{} tool results do not answer the {} pending calls",
                    results.len(),
                    pending.len()
                )));
            }

            let message = LlmMessage {
                role: MessageRole::User,
                content: results.iter().map(|r| r.to_content_block()).collect(),
            };
            let next = step + 1;
            Ok(enter_node(
                ctx,
                next,
                GraphState::CallingModel {
                    attempt: 1,
                    step: next,
                },
                vec![Effect::append(message)],
                Effect::RequestModel,
            ))
        }

        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

/// Move into `node` as step `step`, or fail once the step budget is spent
fn enter_node(
    ctx: &GraphContext,
    step: u32,
    node: GraphState,
    effects: Vec<Effect>,
    effect: Effect,
) -> TransitionResult {
    if step > ctx.max_steps {
        let message = format!(
            "Recursion limit of {} reached without hitting a stop condition",
            ctx.max_steps
        );
        return TransitionResult::new(GraphState::Failed {
            message: message.clone(),
        })
        .with_effects(effects)
        .with_effect(Effect::notify_failed(message));
    }
    TransitionResult::new(node)
        .with_effects(effects)
        .with_effect(effect)
}

/// Delay before retry number `retry` (1-based): 1s, 2s, 4s, ...
///
/// A server-provided `retry_after` wins when it is longer. Capped at
/// [`MAX_RETRY_DELAY`].
pub fn retry_delay(retry: u32, retry_after: Option<Duration>) -> Duration {
    let exponent = retry.saturating_sub(1).min(16);
    let backoff = Duration::from_secs(1u64 << exponent);
    retry_after
        .map_or(backoff, |server| server.max(backoff))
        .min(MAX_RETRY_DELAY)
}
