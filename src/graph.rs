//! Agent/tools workflow graph
//!
//! Two nodes and one conditional edge, written as a pure state machine in the
//! Elm style: `transition` maps a state and an event to a new state plus the
//! effects the runtime must carry out. The agent node calls the model; when
//! the reply requests tools the graph moves to the tools node, which always
//! leads back to the agent. A reply without tool calls ends the turn.

mod effect;
pub mod event;
pub mod state;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, Notification};
pub use event::Event;
pub use state::{GraphContext, GraphState, ToolCall, ToolResult};
pub use transition::{
    retry_delay, should_continue, transition, Route, TransitionError, TransitionResult,
    MAX_RETRIES, MAX_RETRY_DELAY,
};
