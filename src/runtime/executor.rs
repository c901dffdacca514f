//! Turn executor

use super::traits::{LlmClient, ToolExecutor};
use super::{AgentEvent, ConversationEvent, Transcript};
use crate::graph::{
    transition, Effect, Event, GraphContext, GraphState, Notification, ToolCall, ToolResult,
    TransitionError,
};
use crate::llm::{LlmRequest, SystemContent, ToolDefinition, Usage};
use crate::tools::ToolOutput;
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Random extra wait added to each retry delay, in milliseconds
const RETRY_JITTER_MS: u64 = 250;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// The graph ended in its failed state
    #[error("{0}")]
    Failed(String),

    #[error("Turn cancelled")]
    Cancelled,
}

/// Result of a completed turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    /// Text of the final model reply
    pub answer: String,
    /// Graph nodes executed
    pub steps: u32,
    pub usage: Usage,
}

/// Executes conversation turns; shared by every session
pub struct AgentRuntime<L, T>
where
    L: LlmClient,
    T: ToolExecutor,
{
    llm: L,
    tools: T,
    system_prompt: String,
    max_steps: u32,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    events: broadcast::Sender<ConversationEvent>,
}

/// Mutable bookkeeping of one turn
struct Turn<'a> {
    conversation_id: &'a str,
    transcript: &'a mut Transcript,
    cancel: &'a CancellationToken,
    state: GraphState,
    steps: u32,
    usage: Usage,
}

impl<L, T> AgentRuntime<L, T>
where
    L: LlmClient,
    T: ToolExecutor,
{
    pub fn new(llm: L, tools: T, system_prompt: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        Self {
            llm,
            tools,
            system_prompt: system_prompt.into(),
            max_steps: crate::config::DEFAULT_MAX_STEPS,
            max_tokens: None,
            temperature: None,
            events,
        }
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    #[must_use]
    pub fn with_generation(mut self, max_tokens: Option<u32>, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Receive events of every turn started after this call
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.definitions()
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run one user turn to completion.
    ///
    /// On success the transcript holds the user message, every model reply
    /// and tool result of the turn. On any error it is rolled back to its
    /// length before the turn.
    pub async fn run_turn(
        &self,
        conversation_id: &str,
        transcript: &mut Transcript,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, RuntimeError> {
        let checkpoint = transcript.len();
        tracing::info!(conv_id = %conversation_id, history = checkpoint, "Starting turn");

        let mut turn = Turn {
            conversation_id,
            transcript,
            cancel,
            state: GraphState::Idle,
            steps: 0,
            usage: Usage::default(),
        };
        let result = self
            .drive(
                &mut turn,
                Event::UserMessage {
                    text: user_text.to_string(),
                },
            )
            .await;

        match result {
            Ok(outcome) => {
                tracing::info!(
                    conv_id = %conversation_id,
                    steps = outcome.steps,
                    input_tokens = outcome.usage.input_tokens,
                    output_tokens = outcome.usage.output_tokens,
                    "Turn complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                turn.transcript.rollback(checkpoint);
                tracing::warn!(conv_id = %conversation_id, error = %e, "Turn failed");
                if !matches!(e, RuntimeError::Failed(_)) {
                    // Failed turns already reported through the graph
                    self.emit(
                        conversation_id,
                        AgentEvent::Error {
                            message: e.to_string(),
                        },
                    );
                }
                Err(e)
            }
        }
    }

    async fn drive(&self, turn: &mut Turn<'_>, first: Event) -> Result<TurnOutcome, RuntimeError> {
        let ctx = GraphContext::new(turn.conversation_id, self.max_steps);
        let mut events = VecDeque::from([first]);

        while let Some(event) = events.pop_front() {
            let result = transition(&turn.state, &ctx, event)?;
            turn.state = result.new_state;
            turn.steps = turn.steps.max(turn.state.step());

            for effect in result.effects {
                if let Some(next) = self.execute_effect(turn, effect).await? {
                    events.push_back(next);
                }
            }
        }

        match &turn.state {
            GraphState::Done => Ok(TurnOutcome {
                answer: turn.transcript.last_text().unwrap_or_default(),
                steps: turn.steps,
                usage: turn.usage,
            }),
            GraphState::Failed { message } => Err(RuntimeError::Failed(message.clone())),
            other => Err(RuntimeError::Transition(TransitionError::InvalidTransition(
                format!("Turn stopped in state {other:?}"),
            ))),
        }
    }

    /// Execute an effect and optionally return the event it produces
    async fn execute_effect(
        &self,
        turn: &mut Turn<'_>,
        effect: Effect,
    ) -> Result<Option<Event>, RuntimeError> {
        match effect {
            Effect::AppendMessage { message } => {
                turn.transcript.push(message.clone());
                self.emit(turn.conversation_id, AgentEvent::Message { message });
                Ok(None)
            }

            Effect::RequestModel => {
                let request = LlmRequest {
                    system: vec![SystemContent::new(&self.system_prompt)],
                    messages: turn.transcript.messages().to_vec(),
                    tools: self.tools.definitions(),
                    max_tokens: self.max_tokens,
                    temperature: self.temperature,
                };

                let cancel = turn.cancel;
                let result = tokio::select! {
                    biased;

                    () = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                    result = self.llm.complete(&request) => result,
                };

                Ok(Some(match result {
                    Ok(response) => {
                        turn.usage.add(&response.usage);
                        Event::ModelResponse {
                            content: response.content,
                            usage: response.usage,
                        }
                    }
                    Err(e) => Event::from(e),
                }))
            }

            Effect::ExecuteTools { calls } => {
                let mut results = Vec::with_capacity(calls.len());
                for call in calls {
                    results.push(self.execute_tool(turn, &call).await?);
                }
                Ok(Some(Event::ToolsComplete { results }))
            }

            Effect::ScheduleRetry { delay, attempt } => {
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=RETRY_JITTER_MS));
                tracing::info!(
                    conv_id = %turn.conversation_id,
                    attempt,
                    delay_ms = %(delay + jitter).as_millis(),
                    "Scheduling model retry"
                );
                let cancel = turn.cancel;
                tokio::select! {
                    biased;

                    () = cancel.cancelled() => Err(RuntimeError::Cancelled),
                    () = tokio::time::sleep(delay + jitter) => Ok(Some(Event::RetryElapsed { attempt })),
                }
            }

            Effect::Notify(notification) => {
                let event = match notification {
                    Notification::Retrying {
                        attempt,
                        delay,
                        message,
                    } => AgentEvent::Retrying {
                        attempt,
                        delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        message,
                    },
                    Notification::Done => AgentEvent::Done {
                        answer: turn.transcript.last_text().unwrap_or_default(),
                        usage: turn.usage,
                    },
                    Notification::Failed { message } => AgentEvent::Error { message },
                };
                self.emit(turn.conversation_id, event);
                Ok(None)
            }
        }
    }

    async fn execute_tool(
        &self,
        turn: &Turn<'_>,
        call: &ToolCall,
    ) -> Result<ToolResult, RuntimeError> {
        if turn.cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        self.emit(
            turn.conversation_id,
            AgentEvent::ToolStarted {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.input.clone(),
            },
        );
        tracing::info!(conv_id = %turn.conversation_id, tool = %call.name, id = %call.id, "Executing tool");

        let output = self
            .tools
            .execute(
                &call.name,
                call.input.clone(),
                turn.cancel.clone(),
                turn.conversation_id,
            )
            .await
            .unwrap_or_else(|| ToolOutput::error(format!("Unknown tool: {}", call.name)));

        if turn.cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        self.emit(
            turn.conversation_id,
            AgentEvent::ToolFinished {
                id: call.id.clone(),
                name: call.name.clone(),
                success: output.success,
                output: output.output.clone(),
            },
        );
        Ok(ToolResult::new(call, output))
    }

    fn emit(&self, conversation_id: &str, event: AgentEvent) {
        // No subscribers is fine
        let _ = self.events.send(ConversationEvent {
            conversation_id: conversation_id.to_string(),
            event,
        });
    }
}
