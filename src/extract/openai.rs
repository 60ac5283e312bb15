// OpenAI-compatible chat-completions topic extractor.
//
// One request per review. The prompt asks for a JSON object with category,
// topic and sentiment; parse.rs turns whatever comes back into a
// TopicRecord. Requests are paced by a RateLimiter so a large backlog
// doesn't trip the provider's per-minute limits.
//
// Any endpoint that speaks the /chat/completions schema works: set
// OPENAI_API_URL to point elsewhere.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::parse::parse_extraction;
use super::rate_limiter::RateLimiter;
use super::traits::TopicExtractor;
use crate::db::models::{Review, TopicRecord};
use crate::output::truncate_chars;

/// Default API base URL.
pub const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Default chat model.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 100;

pub struct OpenAiExtractor {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl OpenAiExtractor {
    /// Create an extractor. `requests_per_second` of 0 disables pacing.
    pub fn new(api_key: String, model: String, base_url: &str, requests_per_second: f64) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(requests_per_second),
        }
    }
}

/// The extraction prompt for one review.
pub fn build_prompt(review_text: &str) -> String {
    format!(
        "Analyze this app review and extract the main topic.\n\
         Respond with a JSON object with these fields:\n\
         - category: one of ['issue', 'feature_request', 'feedback', 'other']\n\
         - topic: brief description of the topic\n\
         - sentiment: one of ['positive', 'negative', 'neutral']\n\
         \n\
         Review: {review_text}\n\
         \n\
         JSON Response:"
    )
}

#[async_trait]
impl TopicExtractor for OpenAiExtractor {
    async fn extract_review(&self, review: &Review) -> Result<Option<TopicRecord>> {
        if review.content.trim().is_empty() {
            return Ok(None);
        }

        self.rate_limiter.acquire().await;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: build_prompt(&review.content),
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to call chat completions API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Chat completions API returned {}: {}", status, body);
        }

        let result: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completions response")?;

        let reply = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("Chat completions response had no content"))?;

        let record = parse_extraction(&reply, review);

        debug!(
            review_id = %review.review_id,
            category = %record.category,
            sentiment = %record.sentiment,
            topic = %record.topic,
            text_preview = %truncate_chars(&review.content, 50),
            "Extracted topic"
        );

        Ok(Some(record))
    }
}

// --- Chat completions request/response types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Deserialize)]
pub struct ChatReply {
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_prompt_embeds_review_text() {
        let prompt = build_prompt("Crashes every time I open a chat");
        assert!(prompt.contains("Review: Crashes every time I open a chat"));
        assert!(prompt.contains("feature_request"));
        assert!(prompt.trim_end().ends_with("JSON Response:"));
    }

    #[test]
    fn test_request_serializes_expected_fields() {
        let request = ChatRequest {
            model: "gpt-test",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi".to_string(),
            }],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-test");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 100);
    }

    #[tokio::test]
    async fn test_blank_review_skipped_without_request() {
        // Unroutable base URL: a request would fail, so Ok(None) proves none was made
        let extractor = OpenAiExtractor::new(
            "key".to_string(),
            "model".to_string(),
            "http://127.0.0.1:9",
            0.0,
        );
        let review = Review {
            review_id: "r1".to_string(),
            user_name: String::new(),
            content: "   ".to_string(),
            score: 1,
            at: Utc::now(),
            thumbs_up: 0,
            app_version: None,
        };
        assert!(extractor.extract_review(&review).await.unwrap().is_none());
    }
}
