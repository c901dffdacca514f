//! Google Gemini provider implementation
//!
//! Talks to `generateContent` either on Vertex AI (bearer token from the GCP
//! token source) or on the public Generative Language API (API key).

use super::types::{ContentBlock, LlmRequest, LlmResponse, MessageRole, Usage};
use super::{LlmError, LlmService};
use crate::gcp::TokenSource;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const PUBLIC_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// How requests are authenticated, which also selects the endpoint
pub enum GeminiAuth {
    /// Public Generative Language API with an API key
    ApiKey(String),
    /// Vertex AI in a given project and region
    Vertex {
        project: String,
        location: String,
        tokens: Arc<dyn TokenSource>,
    },
}

/// Gemini service implementation
pub struct GeminiService {
    client: Client,
    auth: GeminiAuth,
    url: String,
    model_id: String,
}

impl GeminiService {
    /// Create a service for `model`.
    ///
    /// `base_url` replaces the scheme and host of the endpoint; the API path
    /// is always appended.
    pub fn new(auth: GeminiAuth, model: &str, base_url: Option<&str>) -> Result<Self, LlmError> {
        let url = match &auth {
            GeminiAuth::ApiKey(_) => format!(
                "{}/v1beta/models/{model}:generateContent",
                base_url.unwrap_or(PUBLIC_API_BASE).trim_end_matches('/')
            ),
            GeminiAuth::Vertex {
                project, location, ..
            } => {
                let base = base_url.map_or_else(
                    || format!("https://{location}-aiplatform.googleapis.com"),
                    |b| b.trim_end_matches('/').to_string(),
                );
                format!(
                    "{base}/v1/projects/{project}/locations/{location}/publishers/google/models/{model}:generateContent"
                )
            }
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| LlmError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            auth,
            url,
            model_id: model.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    fn translate_request(request: &LlmRequest) -> GeminiRequest {
        let system_instruction = if request.system.is_empty() {
            None
        } else {
            Some(GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text {
                    thought: None,
                    text: request
                        .system
                        .iter()
                        .map(|s| s.text.as_str())
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                }],
            })
        };

        let mut contents = Vec::new();
        for msg in &request.messages {
            let role = match msg.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };

            let parts: Vec<GeminiPart> = msg
                .content
                .iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => GeminiPart::Text {
                        text: text.clone(),
                        thought: None,
                    },
                    ContentBlock::ToolUse { name, input, .. } => GeminiPart::FunctionCall {
                        function_call: GeminiFunctionCall {
                            name: name.clone(),
                            args: args_object(input.clone()),
                        },
                    },
                    ContentBlock::ToolResult {
                        name,
                        content,
                        is_error,
                        ..
                    } => GeminiPart::FunctionResponse {
                        function_response: GeminiFunctionResponse {
                            name: name.clone(),
                            response: if *is_error {
                                serde_json::json!({ "error": content })
                            } else {
                                serde_json::json!({ "result": content })
                            },
                        },
                    },
                })
                .collect();

            // Gemini rejects contents with no parts
            if !parts.is_empty() {
                contents.push(GeminiContent {
                    role: Some(role.to_string()),
                    parts,
                });
            }
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|t| GeminiFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.input_schema.clone(),
                    })
                    .collect(),
            }])
        };

        GeminiRequest {
            contents,
            system_instruction,
            tools,
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            }),
        }
    }

    fn normalize_response(resp: GeminiResponse) -> Result<LlmResponse, LlmError> {
        let Some(candidate) = resp.candidates.into_iter().next() else {
            let reason = resp
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            return Err(LlmError::unknown(format!("No candidates in response: {reason}")));
        };

        let mut content = Vec::new();
        let mut call_index = 0usize;
        for part in candidate.content.parts {
            match part {
                GeminiPart::Text { text, thought } => {
                    // Thought summaries are not part of the answer
                    if !text.is_empty() && thought != Some(true) {
                        content.push(ContentBlock::Text { text });
                    }
                }
                GeminiPart::FunctionCall { function_call } => {
                    // Gemini does not assign call ids
                    content.push(ContentBlock::ToolUse {
                        id: format!("call_{call_index}_{}", function_call.name),
                        name: function_call.name,
                        input: args_object(function_call.args),
                    });
                    call_index += 1;
                }
                GeminiPart::FunctionResponse { .. } | GeminiPart::Other(_) => {}
            }
        }

        let finish_reason = candidate.finish_reason.unwrap_or_default();
        if content.is_empty() && !finish_reason.is_empty() && finish_reason != "STOP" {
            return Err(LlmError::unknown(format!(
                "Model returned no content (finish reason: {finish_reason})"
            )));
        }

        let end_turn = call_index == 0;
        let usage = resp.usage_metadata.unwrap_or_default();

        Ok(LlmResponse {
            content,
            end_turn,
            usage: Usage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            },
        })
    }
}

/// Gemini omits `args` for calls without parameters; tools and the API
/// both expect an object
fn args_object(args: serde_json::Value) -> serde_json::Value {
    if args.is_null() {
        serde_json::json!({})
    } else {
        args
    }
}

#[async_trait]
impl LlmService for GeminiService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let gemini_request = Self::translate_request(request);

        let mut builder = self.client.post(&self.url).json(&gemini_request);
        builder = match &self.auth {
            GeminiAuth::ApiKey(key) => builder.header("x-goog-api-key", key),
            GeminiAuth::Vertex { tokens, .. } => {
                let token = tokens
                    .token()
                    .await
                    .map_err(|e| LlmError::auth(format!("Failed to obtain access token: {e}")))?;
                builder.bearer_auth(token)
            }
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                LlmError::network(format!("Connection failed: {e}"))
            } else {
                LlmError::unknown(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&body)
                .map_or(body, |e| e.error.message);
            let error = LlmError::from_status(status.as_u16(), &message);
            return Err(match retry_after {
                Some(delay) => error.with_retry_after(delay),
                None => error,
            });
        }

        let gemini_response: GeminiResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        Self::normalize_response(gemini_response)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// Gemini API types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<bool>,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
    /// Parts this client does not use (inline data, thoughts, ...)
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::StaticToken;
    use crate::llm::{LlmErrorKind, LlmMessage, SystemContent, ToolDefinition};
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> LlmRequest {
        LlmRequest {
            system: vec![SystemContent::new("You are a monitoring agent.")],
            messages: vec![
                LlmMessage::user("Any errors today?"),
                LlmMessage::assistant(vec![ContentBlock::tool_use(
                    "call_0_check_gcp_logs",
                    "check_gcp_logs",
                    json!({"hours": 24}),
                )]),
                LlmMessage {
                    role: MessageRole::User,
                    content: vec![ContentBlock::tool_result(
                        "call_0_check_gcp_logs",
                        "check_gcp_logs",
                        "No log entries",
                        false,
                    )],
                },
            ],
            tools: vec![ToolDefinition {
                name: "check_gcp_logs".to_string(),
                description: "Query logs".to_string(),
                input_schema: json!({"type": "object", "properties": {}}),
            }],
            max_tokens: Some(1024),
            temperature: Some(0.0),
        }
    }

    #[test]
    fn test_translate_request_shapes_wire_format() {
        let wire = serde_json::to_value(GeminiService::translate_request(&sample_request())).unwrap();

        assert_eq!(
            wire["systemInstruction"]["parts"][0]["text"],
            "You are a monitoring agent."
        );
        assert!(wire["systemInstruction"].get("role").is_none());
        assert_eq!(wire["contents"][0]["role"], "user");
        assert_eq!(wire["contents"][1]["role"], "model");
        assert_eq!(
            wire["contents"][1]["parts"][0]["functionCall"]["name"],
            "check_gcp_logs"
        );
        assert_eq!(
            wire["contents"][2]["parts"][0]["functionResponse"]["name"],
            "check_gcp_logs"
        );
        assert_eq!(
            wire["contents"][2]["parts"][0]["functionResponse"]["response"]["result"],
            "No log entries"
        );
        assert_eq!(
            wire["tools"][0]["functionDeclarations"][0]["name"],
            "check_gcp_logs"
        );
        assert_eq!(wire["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(wire["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_error_results_use_error_key() {
        let mut request = sample_request();
        request.messages[2].content = vec![ContentBlock::tool_result(
            "call_0_check_gcp_logs",
            "check_gcp_logs",
            "permission denied",
            true,
        )];
        let wire = serde_json::to_value(GeminiService::translate_request(&request)).unwrap();
        let response = &wire["contents"][2]["parts"][0]["functionResponse"]["response"];
        assert_eq!(response["error"], "permission denied");
        assert!(response.get("result").is_none());
    }

    #[test]
    fn test_normalize_function_calls() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "Let me look."},
                    {"functionCall": {"name": "check_gcp_logs", "args": {"hours": 6}}},
                    {"functionCall": {"name": "check_gcp_traces", "args": {}}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 14, "totalTokenCount": 134}
        }))
        .unwrap();

        let response = GeminiService::normalize_response(resp).unwrap();
        assert!(!response.end_turn);
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].0, "call_0_check_gcp_logs");
        assert_eq!(uses[1].0, "call_1_check_gcp_traces");
        assert_eq!(uses[0].2["hours"], 6);
        assert_eq!(response.usage.input_tokens, 120);
        assert_eq!(response.usage.output_tokens, 14);
    }

    #[test]
    fn test_normalize_blocked_prompt() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        let err = GeminiService::normalize_response(resp).unwrap_err();
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn test_normalize_ignores_unknown_parts() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [
                    {"thoughtSignature": "abc"},
                    {"text": "All clear."}
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        let response = GeminiService::normalize_response(resp).unwrap();
        assert!(response.end_turn);
        assert_eq!(response.text(), "All clear.");
    }

    #[test]
    fn test_normalize_call_without_args() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"functionCall": {"name": "check_gcp_logs"}}
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();

        let response = GeminiService::normalize_response(resp).unwrap();
        let uses = response.tool_uses();
        assert_eq!(uses.len(), 1);
        assert_eq!(uses[0].2, &json!({}));

        // Echoed back as an object on the next request
        let mut request = sample_request();
        request.messages[1] = LlmMessage::assistant(response.content);
        let wire = serde_json::to_value(GeminiService::translate_request(&request)).unwrap();
        assert_eq!(
            wire["contents"][1]["parts"][0]["functionCall"]["args"],
            json!({})
        );
    }

    #[test]
    fn test_null_tool_input_is_sent_as_object() {
        let mut request = sample_request();
        request.messages[1] = LlmMessage::assistant(vec![ContentBlock::tool_use(
            "call_0_check_gcp_logs",
            "check_gcp_logs",
            serde_json::Value::Null,
        )]);
        let wire = serde_json::to_value(GeminiService::translate_request(&request)).unwrap();
        assert_eq!(
            wire["contents"][1]["parts"][0]["functionCall"]["args"],
            json!({})
        );
    }

    #[test]
    fn test_normalize_skips_thoughts() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "The user wants a log check, so...", "thought": true},
                    {"text": "No errors found."}
                ]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        let response = GeminiService::normalize_response(resp).unwrap();
        assert_eq!(response.content.len(), 1);
        assert_eq!(response.text(), "No errors found.");
    }

    #[test]
    fn test_vertex_endpoint() {
        let service = GeminiService::new(
            GeminiAuth::Vertex {
                project: "my-proj".to_string(),
                location: "us-central1".to_string(),
                tokens: Arc::new(StaticToken::new("t")),
            },
            "gemini-2.0-flash-001",
            None,
        )
        .unwrap();
        assert_eq!(
            service.endpoint(),
            "https://us-central1-aiplatform.googleapis.com/v1/projects/my-proj/locations/us-central1/publishers/google/models/gemini-2.0-flash-001:generateContent"
        );
    }

    #[tokio::test]
    async fn test_complete_against_vertex_mock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/v1/projects/p/locations/us-central1/publishers/google/models/gemini-2.0-flash-001:generateContent",
            ))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "No errors found."}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let service = GeminiService::new(
            GeminiAuth::Vertex {
                project: "p".to_string(),
                location: "us-central1".to_string(),
                tokens: Arc::new(StaticToken::new("test-token")),
            },
            "gemini-2.0-flash-001",
            Some(&server.uri()),
        )
        .unwrap();

        let response = service.complete(&sample_request()).await.unwrap();
        assert!(response.end_turn);
        assert_eq!(response.text(), "No errors found.");
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-goog-api-key", "k"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "7")
                    .set_body_json(json!({"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}})),
            )
            .mount(&server)
            .await;

        let service = GeminiService::new(
            GeminiAuth::ApiKey("k".to_string()),
            "gemini-2.0-flash-001",
            Some(&server.uri()),
        )
        .unwrap();

        let err = service.complete(&sample_request()).await.unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::RateLimit);
        assert!(err.message.contains("Quota exceeded"));
        assert_eq!(err.retry_after, Some(Duration::from_secs(7)));
    }
}
