//! Suggestion service client.
//!
//! [`Assistant`] is the capability the views and commands depend on. The
//! Gemini implementation talks to the `generateContent` endpoint over a
//! blocking HTTP agent; [`NoopAssistant`] stands in when no key is
//! configured. Failures never reach callers: they are logged and replaced by
//! an empty suggestion list or a canned summary.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::AiConfig;
use crate::task::Task;

pub const SUMMARY_FALLBACK: &str = "Stay focused and keep moving forward.";
pub const SUMMARY_EMPTY: &str = "Keep crushing those goals!";
const COACH_INSTRUCTION: &str = "You are a highly productive life coach.";

pub trait Assistant: Send + Sync {
    /// Proposed subtask titles for a task. Empty on any failure.
    fn suggest_subtasks(&self, title: &str, description: &str) -> Vec<String>;

    /// Short motivational summary of the collection.
    fn dashboard_summary(&self, tasks: &[Task]) -> String;

    /// Whether this assistant can reach a model at all.
    fn is_available(&self) -> bool {
        true
    }
}

/// Pick the assistant for a resolved configuration.
pub fn from_config(config: &AiConfig) -> Arc<dyn Assistant> {
    match config.api_key.as_deref() {
        Some(key) if config.is_usable() => {
            info!(model = %config.model, "AI suggestions enabled");
            Arc::new(GeminiAssistant::new(
                key,
                &config.model,
                &config.endpoint,
                config.timeout,
            ))
        }
        _ => {
            info!("AI suggestions disabled (no API key or turned off)");
            Arc::new(NoopAssistant)
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum AiError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Client for the Gemini `generateContent` API.
pub struct GeminiAssistant {
    agent: ureq::Agent,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiAssistant {
    pub fn new(api_key: &str, model: &str, endpoint: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            api_key: api_key.to_string(),
            model: model.to_string(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn generate(&self, body: &Value) -> Result<String, AiError> {
        let body_str =
            serde_json::to_string(body).map_err(|e| AiError::Malformed(e.to_string()))?;
        debug!(model = %self.model, "calling generateContent");

        let response = match self
            .agent
            .post(&self.url())
            .set("Content-Type", "application/json")
            .set("x-goog-api-key", &self.api_key)
            .send_string(&body_str)
        {
            Ok(resp) => resp,
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                return Err(AiError::Status { status, body });
            }
            Err(e) => return Err(AiError::Transport(e.to_string())),
        };

        let text = response
            .into_string()
            .map_err(|e| AiError::Transport(e.to_string()))?;
        extract_text(&text)
    }

    fn try_suggest(&self, title: &str, description: &str) -> Result<Vec<String>, AiError> {
        let text = self.generate(&subtask_request(title, description))?;
        parse_subtasks(&text)
    }
}

impl Assistant for GeminiAssistant {
    fn suggest_subtasks(&self, title: &str, description: &str) -> Vec<String> {
        match self.try_suggest(title, description) {
            Ok(subtasks) => {
                info!(count = subtasks.len(), "received subtask suggestions");
                subtasks
            }
            Err(e) => {
                warn!(error = %e, "subtask suggestion failed");
                Vec::new()
            }
        }
    }

    fn dashboard_summary(&self, tasks: &[Task]) -> String {
        match self.generate(&summary_request(tasks)) {
            Ok(text) if text.trim().is_empty() => SUMMARY_EMPTY.to_string(),
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "dashboard summary failed");
                SUMMARY_FALLBACK.to_string()
            }
        }
    }
}

/// Assistant used when the service is not configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAssistant;

impl Assistant for NoopAssistant {
    fn suggest_subtasks(&self, _title: &str, _description: &str) -> Vec<String> {
        Vec::new()
    }

    fn dashboard_summary(&self, _tasks: &[Task]) -> String {
        SUMMARY_FALLBACK.to_string()
    }

    fn is_available(&self) -> bool {
        false
    }
}

pub fn subtask_prompt(title: &str, description: &str) -> String {
    format!("Break down the task \"{title}\" ({description}) into 3-5 actionable subtasks.")
}

pub fn summary_prompt(tasks: &[Task]) -> String {
    let listing = tasks
        .iter()
        .map(|t| format!("{} ({})", t.title, t.status))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Analyze these tasks and give a short, motivational summary of progress and what to focus on next: {listing}"
    )
}

fn subtask_request(title: &str, description: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": subtask_prompt(title, description) }] }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": {
                "type": "OBJECT",
                "properties": {
                    "subtasks": { "type": "ARRAY", "items": { "type": "STRING" } }
                },
                "required": ["subtasks"]
            }
        }
    })
}

fn summary_request(tasks: &[Task]) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": summary_prompt(tasks) }] }],
        "systemInstruction": { "parts": [{ "text": COACH_INSTRUCTION }] }
    })
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Concatenated text parts of the first candidate.
fn extract_text(body: &str) -> Result<String, AiError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AiError::Malformed(e.to_string()))?;
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AiError::Malformed("no candidates".into()))?;
    Ok(candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default())
}

#[derive(Deserialize)]
struct SubtaskPayload {
    #[serde(default)]
    subtasks: Vec<String>,
}

/// Decode the `{ "subtasks": [...] }` answer, dropping blank entries.
fn parse_subtasks(text: &str) -> Result<Vec<String>, AiError> {
    let payload: SubtaskPayload =
        serde_json::from_str(text.trim()).map_err(|e| AiError::Malformed(e.to_string()))?;
    Ok(payload
        .subtasks
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
