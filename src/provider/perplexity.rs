//! Perplexity chat completions client (OpenAI-compatible wire format)

use super::{clean_citation, error_for_status, CitationSource, FetchError};
use crate::config::{citation_prompt, ProviderConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str =
    "You are a bibliographer. Reply with a single APA style reference line and nothing else.";

pub struct PerplexityClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl PerplexityClient {
    pub fn new(http: reqwest::Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl CitationSource for PerplexityClient {
    async fn fetch_citation(&self, url: &str) -> Result<String, FetchError> {
        let start = Instant::now();
        let prompt = citation_prompt(url);
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Perplexity request failed");
                FetchError::Network(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(error_for_status(response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Parse(e.to_string()))?;

        debug!(
            model = %self.config.model,
            duration_ms = start.elapsed().as_millis(),
            "Perplexity chat completion"
        );

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(FetchError::EmptyResponse)?;

        clean_citation(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let body: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"1. Doe, J. (2024)."}}]}"#,
        )
        .unwrap();
        let content = body.choices[0].message.content.as_deref().unwrap();
        assert_eq!(clean_citation(content).unwrap(), "Doe, J. (2024).");
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "sonar",
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "sonar");
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
