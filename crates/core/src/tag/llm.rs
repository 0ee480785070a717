//! HTTP-backed classifier for escalated questions.
//!
//! Speaks an OpenAI-style chat-completions API. Calls are paced with a
//! mandatory inter-call delay and retried with exponential backoff on
//! rate-limit responses; the shared pacing state makes the client safe to
//! hand to the batch driver's worker threads.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::model::Tag;

use super::classify::{Classifier, ClassifyRequest};

const MAX_ATTEMPTS: u32 = 4;
const BACKOFF_BASE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct HttpClassifierConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    /// Minimum gap between consecutive requests.
    pub min_call_interval: Duration,
    /// Topic vocabulary the model must choose from.
    pub topics: Vec<String>,
}

impl HttpClassifierConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            min_call_interval: Duration::from_millis(1100),
            topics: Vec::new(),
        }
    }
}

pub struct HttpClassifier {
    client: Client,
    config: HttpClassifierConfig,
    last_call: Mutex<Option<Instant>>,
}

impl HttpClassifier {
    pub fn new(config: HttpClassifierConfig) -> Result<Self> {
        let client = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PipelineError::Classifier(format!("http client: {e}")))?;
        Ok(Self {
            client,
            config,
            last_call: Mutex::new(None),
        })
    }

    /// Blocks until the mandatory inter-call gap has elapsed, then stamps
    /// the call time. Held briefly; the HTTP round trip itself runs
    /// outside the lock.
    fn pace(&self) {
        let mut last = match self.last_call.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(at) = *last {
            let elapsed = at.elapsed();
            if elapsed < self.config.min_call_interval {
                std::thread::sleep(self.config.min_call_interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    fn prompt(&self, request: &ClassifyRequest) -> String {
        let vocabulary = self.config.topics.join(", ");
        format!(
            "Classify this exam question into topics from this list: {vocabulary}.\n\
             Respond with JSON only: {{\"tags\": [{{\"topic\": \"...\", \"confidence\": 0.0}}]}}\n\n\
             Question:\n{}\n\nMark scheme:\n{}",
            request.context_text, request.ms_text
        )
    }

    fn call_once(&self, request: &ClassifyRequest) -> Result<reqwest::blocking::Response> {
        self.pace();
        self.client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "model": self.config.model,
                "temperature": 0.0,
                "messages": [
                    {"role": "user", "content": self.prompt(request)}
                ]
            }))
            .send()
            .map_err(|e| PipelineError::Classifier(format!("request failed: {e}")))
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Serialize, Deserialize)]
struct RankedTags {
    tags: Vec<RankedTag>,
}

#[derive(Serialize, Deserialize)]
struct RankedTag {
    topic: String,
    confidence: f64,
}

/// Extracts the ranked-tag JSON from a model reply, tolerating prose or
/// code fences around the object.
fn parse_reply(content: &str) -> Result<Vec<Tag>> {
    let start = content
        .find('{')
        .ok_or_else(|| PipelineError::Classifier("no JSON object in reply".to_string()))?;
    let end = content
        .rfind('}')
        .ok_or_else(|| PipelineError::Classifier("no JSON object in reply".to_string()))?;
    let ranked: RankedTags = serde_json::from_str(&content[start..=end])
        .map_err(|e| PipelineError::Classifier(format!("bad tag JSON: {e}")))?;
    Ok(ranked
        .tags
        .into_iter()
        .map(|t| {
            let mut tag = Tag::new(t.topic, t.confidence);
            tag.provenance.push("llm".to_string());
            tag
        })
        .collect())
}

impl Classifier for HttpClassifier {
    fn classify(&self, request: &ClassifyRequest) -> Result<Vec<Tag>> {
        let mut backoff = BACKOFF_BASE;
        for attempt in 1..=MAX_ATTEMPTS {
            let response = self.call_once(request)?;
            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                if attempt == MAX_ATTEMPTS {
                    return Err(PipelineError::Classifier(format!(
                        "gave up after {MAX_ATTEMPTS} attempts, last status {status}"
                    )));
                }
                warn!(%status, attempt, "classifier rate limited, backing off");
                std::thread::sleep(backoff);
                backoff *= 2;
                continue;
            }
            if !status.is_success() {
                return Err(PipelineError::Classifier(format!(
                    "unexpected status {status}"
                )));
            }
            let chat: ChatResponse = response
                .json()
                .map_err(|e| PipelineError::Classifier(format!("bad response body: {e}")))?;
            let content = chat
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .unwrap_or_default();
            let tags = parse_reply(content)?;
            debug!(
                question = request.question_number,
                tags = tags.len(),
                "classifier reply parsed"
            );
            return Ok(tags);
        }
        unreachable!("loop returns on every path")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json_reply() {
        let tags =
            parse_reply(r#"{"tags": [{"topic": "CALC", "confidence": 0.85}]}"#).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].topic, "CALC");
        assert_eq!(tags[0].confidence, 0.85);
        assert!(tags[0].provenance.contains(&"llm".to_string()));
    }

    #[test]
    fn parses_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"tags\": [{\"topic\": \"TRIG\", \"confidence\": 0.6}]}\n```";
        let tags = parse_reply(reply).unwrap();
        assert_eq!(tags[0].topic, "TRIG");
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let tags =
            parse_reply(r#"{"tags": [{"topic": "X", "confidence": 1.7}]}"#).unwrap();
        assert_eq!(tags[0].confidence, 1.0);
    }

    #[test]
    fn reply_without_json_fails() {
        assert!(parse_reply("I cannot classify this question.").is_err());
    }
}
