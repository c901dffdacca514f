//! GitHub file fetch tool

use super::{parse_input, Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Files longer than this are cut before being handed to the model
const MAX_FILE_BYTES: usize = 100 * 1024;

#[derive(Debug, Deserialize)]
struct QueryGithubFileInput {
    relative_path: String,
}

/// Source of one file in the monitored repository
pub struct QueryGithubFileTool;

#[async_trait]
impl Tool for QueryGithubFileTool {
    fn name(&self) -> &'static str {
        "query_github_file"
    }

    fn description(&self) -> String {
        "Get the source code of a file in the service's GitHub repository, at the configured branch. Pass the path relative to the repository root (e.g. app/routes.py). Use it after an error log names a file, to find the failing line and propose a fix.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["relative_path"],
            "properties": {
                "relative_path": {
                    "type": "string",
                    "description": "Path of the file relative to the repository root"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: QueryGithubFileInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };
        let github = match ctx.services.github() {
            Ok(g) => g,
            Err(out) => return out,
        };

        match github.get_file(&input.relative_path).await {
            Ok(content) => ToolOutput::success(render_file(&content)),
            Err(e) => {
                tracing::warn!(
                    conv_id = %ctx.conversation_id,
                    path = %input.relative_path,
                    error = %e,
                    "GitHub file fetch failed"
                );
                ToolOutput::error(format!("Failed to fetch {}: {e}", input.relative_path))
            }
        }
    }
}

/// Numbered file body, cut at [`MAX_FILE_BYTES`]; the truncation marker is
/// not numbered
fn render_file(content: &str) -> String {
    let (kept, truncated) = truncate_bytes(content);
    let mut rendered = number_lines(kept);
    if truncated {
        rendered.push_str("\n... [file truncated]");
    }
    rendered
}

fn truncate_bytes(content: &str) -> (&str, bool) {
    if content.len() <= MAX_FILE_BYTES {
        return (content, false);
    }
    let mut cut = MAX_FILE_BYTES;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    (content.get(..cut).unwrap_or_default(), true)
}

/// Prefix each line with its 1-based number so the model can cite lines
fn number_lines(content: &str) -> String {
    let width = content.lines().count().max(1).to_string().len();
    content
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} | {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
