// crates/socratic-bench-providers/src/http.rs
// ============================================================================
// Module: HTTP Model Invoker
// Description: Blocking chat-completions invoker with strict limits.
// Purpose: Call OpenAI-compatible endpoints with deadlines and error mapping.
// Dependencies: reqwest, serde, serde_json, socratic-bench-core
// ============================================================================

//! ## Overview
//! The HTTP invoker posts chat-completion requests to an OpenAI-compatible
//! endpoint over blocking `reqwest`. Each invocation carries the request
//! deadline as the HTTP timeout. Status codes map onto the invoker error
//! taxonomy: 429 throttles, 5xx transports (both transient), other 4xx
//! refusals, and unusable bodies are malformed (both permanent). Responses
//! report upstream token accounting verbatim.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::Instant;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::Serialize;
use socratic_bench_core::ChatMessage;
use socratic_bench_core::InvocationRequest;
use socratic_bench_core::InvocationResponse;
use socratic_bench_core::InvokerError;
use socratic_bench_core::ModelInvoker;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP invoker.
///
/// # Invariants
/// - `endpoint` is the full chat-completions URL.
/// - `connect_timeout` bounds connection establishment; the per-request
///   deadline bounds the full lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HttpInvokerConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// Optional bearer token.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Connection timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// User agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Returns the default connection timeout.
const fn default_connect_timeout_ms() -> u64 {
    5_000
}

/// Returns the default user agent.
fn default_user_agent() -> String {
    "socratic-bench/0.1".to_string()
}

// ============================================================================
// SECTION: Wire Shapes
// ============================================================================

/// Outbound chat-completions request body.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    /// Target model identifier.
    model: &'a str,
    /// Prompt messages.
    messages: Vec<WireMessage<'a>>,
    /// Sampling temperature, when configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    /// Maximum completion tokens, when bounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Outbound message shape.
#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    /// Role label.
    role: &'a str,
    /// Message content.
    content: &'a str,
}

/// Inbound chat-completions response body.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    /// Completion choices.
    choices: Vec<Choice>,
    /// Token usage accounting.
    usage: Option<Usage>,
}

/// One completion choice.
#[derive(Debug, Deserialize)]
struct Choice {
    /// Completion message.
    message: ResponseMessage,
}

/// Inbound message shape.
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    /// Message content.
    content: Option<String>,
}

/// Token usage accounting.
#[derive(Debug, Deserialize, Default)]
struct Usage {
    /// Prompt token count.
    #[serde(default)]
    prompt_tokens: u64,
    /// Completion token count.
    #[serde(default)]
    completion_tokens: u64,
}

// ============================================================================
// SECTION: Invoker
// ============================================================================

/// Blocking HTTP [`ModelInvoker`] for OpenAI-compatible endpoints.
///
/// # Invariants
/// - Redirects are not followed.
/// - The request deadline is enforced as the HTTP timeout.
pub struct HttpInvoker {
    /// Invoker configuration.
    config: HttpInvokerConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpInvoker {
    /// Creates an invoker with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InvokerError::Transport`] when the HTTP client cannot be
    /// built.
    pub fn new(config: HttpInvokerConfig) -> Result<Self, InvokerError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| InvokerError::Transport(format!("client build: {err}")))?;
        Ok(Self {
            config,
            client,
        })
    }

    /// Maps prompt messages to the wire shape.
    fn wire_messages(messages: &[ChatMessage]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|message| WireMessage {
                role: message.role.as_str(),
                content: &message.content,
            })
            .collect()
    }
}

impl ModelInvoker for HttpInvoker {
    fn invoke(&self, request: &InvocationRequest) -> Result<InvocationResponse, InvokerError> {
        let body = ChatCompletionRequest {
            model: request.model_id.as_str(),
            messages: Self::wire_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_output_tokens,
        };

        let started = Instant::now();
        let mut builder = self
            .client
            .post(&self.config.endpoint)
            .timeout(request.deadline)
            .json(&body);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().map_err(|err| {
            if err.is_timeout() {
                InvokerError::Timeout(err.to_string())
            } else {
                InvokerError::Transport(err.to_string())
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(InvokerError::Throttled(format!("status {status}")));
        }
        if status.is_server_error() {
            return Err(InvokerError::Transport(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(InvokerError::Refused(format!("status {status}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .map_err(|err| InvokerError::Malformed(format!("response body: {err}")))?;
        let latency_ms =
            u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| InvokerError::Malformed("response has no choices".to_string()))?;
        let usage = parsed.usage.unwrap_or_default();

        Ok(InvocationResponse {
            text,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            latency_ms,
        })
    }
}
