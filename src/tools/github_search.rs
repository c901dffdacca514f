//! Repository search tools
//!
//! Stack traces often carry absolute container paths or bare module names.
//! These tools map them back onto repository paths. Lookup failures are
//! reported as ordinary text so the model can fall back to guessing a path.

use super::{parse_input, Tool, ToolContext, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_LISTED_PATHS: usize = 50;

#[derive(Debug, Deserialize)]
struct FindGithubFileInput {
    file_name: String,
}

/// Locate files in the repository tree by (partial) name
pub struct FindGithubFileTool;

#[async_trait]
impl Tool for FindGithubFileTool {
    fn name(&self) -> &'static str {
        "find_github_file"
    }

    fn description(&self) -> String {
        "Find files in the service's GitHub repository whose path contains the given name (case-insensitive). Use it when a log mentions a file by an absolute or partial path, then pass the matching path to query_github_file.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["file_name"],
            "properties": {
                "file_name": {
                    "type": "string",
                    "description": "File name or path fragment, e.g. routes.py or app/models"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: FindGithubFileInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };
        let github = match ctx.services.github() {
            Ok(g) => g,
            Err(out) => return out,
        };

        let name = strip_container_prefix(&input.file_name);
        match github.find_paths(name).await {
            Ok(found) if found.paths.is_empty() => ToolOutput::success(format!(
                "No file matching '{name}' in {}@{}",
                github.repo(),
                github.git_ref()
            )),
            Ok(found) => {
                let mut out = found
                    .paths
                    .iter()
                    .take(MAX_LISTED_PATHS)
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n");
                if found.paths.len() > MAX_LISTED_PATHS {
                    out.push_str(&format!(
                        "\n... and {} more, refine the name",
                        found.paths.len() - MAX_LISTED_PATHS
                    ));
                }
                if found.truncated {
                    out.push_str("\n(repository listing was truncated by GitHub)");
                }
                ToolOutput::success(out)
            }
            Err(e) => {
                tracing::warn!(conv_id = %ctx.conversation_id, error = %e, "GitHub tree lookup failed");
                ToolOutput::success(format!("Error: {e}"))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchGithubCodeInput {
    query: String,
}

/// GitHub code search scoped to the repository
pub struct SearchGithubCodeTool;

#[async_trait]
impl Tool for SearchGithubCodeTool {
    fn name(&self) -> &'static str {
        "search_github_code"
    }

    fn description(&self) -> String {
        "Search the code of the service's GitHub repository (default branch index) for a term such as a function name or an error message. Returns the paths of matching files.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search terms"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: SearchGithubCodeInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };
        let query = input.query.trim();
        if query.is_empty() {
            return ToolOutput::error("Invalid input: query must not be empty");
        }
        let github = match ctx.services.github() {
            Ok(g) => g,
            Err(out) => return out,
        };

        match github.search_code(query).await {
            Ok(hits) if hits.is_empty() => {
                ToolOutput::success(format!("No code matching '{query}' in {}", github.repo()))
            }
            Ok(hits) => ToolOutput::success(
                hits.iter()
                    .map(|hit| hit.path.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
            ),
            Err(e) => {
                tracing::warn!(conv_id = %ctx.conversation_id, error = %e, "GitHub code search failed");
                ToolOutput::success(format!("Error: {e}"))
            }
        }
    }
}

/// Drop well-known container roots (`/app/`, `/workspace/`, `/srv/`) from a path
fn strip_container_prefix(path: &str) -> &str {
    let path = path.trim();
    for root in ["/app/", "/workspace/", "/srv/", "/usr/src/app/"] {
        if let Some(rest) = path.strip_prefix(root) {
            return rest;
        }
    }
    path
}
