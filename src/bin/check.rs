//! One-shot log check
//!
//! Runs a single agent turn and prints the answer, for cron jobs and
//! manual runs. Exits non-zero when the turn fails.

use log_sentinel::bootstrap::{build_runtime, init_tracing};
use log_sentinel::config::SentinelConfig;
use log_sentinel::runtime::Transcript;
use tokio_util::sync::CancellationToken;

const DEFAULT_PROMPT: &str = "Check the logs of the last 24 hours for errors";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(true);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let prompt = if args.is_empty() {
        DEFAULT_PROMPT.to_string()
    } else {
        args.join(" ")
    };

    let config = SentinelConfig::from_env();
    let runtime = build_runtime(&config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let conversation_id = uuid::Uuid::new_v4().to_string();
    let mut transcript = Transcript::new();
    let outcome = runtime
        .run_turn(&conversation_id, &mut transcript, &prompt, &cancel)
        .await?;

    println!("{}", outcome.answer);
    Ok(())
}
