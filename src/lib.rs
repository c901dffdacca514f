//! log-sentinel - a monitoring chat agent for Google Cloud services
//!
//! The agent reads recent Cloud Logging entries and Cloud Trace traces,
//! correlates errors with source files in a GitHub repository, and can post
//! alerts to a Slack-compatible webhook. A hosted Gemini model decides which
//! lookup to run; the [`graph`] state machine alternates between calling the
//! model and running the tools it requested until the model stops asking.

pub mod alert;
pub mod api;
pub mod bootstrap;
pub mod config;
pub mod gcp;
pub mod github;
pub mod graph;
pub mod llm;
pub mod runtime;
pub mod system_prompt;
pub mod tools;
