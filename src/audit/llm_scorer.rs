//! LLM-backed quality scorer using an OpenAI-compatible API

use super::models::{AuditResult, BusinessContext, CandidateItem, ExistingItem, RELEVANCE};
use super::scorer::{QualityScorer, ScoringError};
use crate::config::ScorerConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Existing titles listed in the prompt
const MAX_EXISTING_IN_PROMPT: usize = 30;

const SYSTEM_PROMPT: &str = "You are a strict reviewer of business recommendations. \
Respond with a single JSON object mapping score names to numbers between 0 and 1. \
Always include \"relevance\", \"specificity\" and \"novelty\".";

/// Scorer delegating evaluation to a chat-completions endpoint.
///
/// Makes exactly one request per call; retries belong to the orchestrator.
pub struct LlmScorer {
    client: Client,
    config: ScorerConfig,
}

impl LlmScorer {
    /// Create a new LLM scorer
    pub fn new(config: ScorerConfig) -> Result<Self, ScoringError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ScoringError::Evaluator(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Build the evaluation prompt
    fn build_prompt(
        &self,
        candidate: &CandidateItem,
        context: &BusinessContext,
        existing: &[&ExistingItem],
    ) -> String {
        let existing_titles: Vec<String> = existing
            .iter()
            .filter(|e| e.id != candidate.id)
            .take(MAX_EXISTING_IN_PROMPT)
            .map(|e| format!("- {}", e.title))
            .collect();

        format!(
            "Business: {} (category: {}, country: {})\n\
            Current focus area: {}\n\n\
            Candidate {}:\nTitle: {}\nDescription: {}\nSource: {}\n\n\
            Already proposed:\n{}\n\n\
            Score relevance to the business and focus area, specificity of the action, \
            and novelty against the already proposed items.",
            context.display_name,
            context.category.as_deref().unwrap_or("unknown"),
            context.country.as_deref().unwrap_or("unknown"),
            context.current_focus_area,
            candidate.kind,
            candidate.title,
            candidate.description_text(),
            candidate.source_tag,
            if existing_titles.is_empty() {
                "(none)".to_string()
            } else {
                existing_titles.join("\n")
            },
        )
    }
}

/// Parse the model's JSON object of scores
fn parse_scores(content: &str) -> Result<AuditResult, ScoringError> {
    // Models sometimes wrap JSON in prose or code fences
    let start = content.find('{');
    let end = content.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &content[s..=e],
        _ => {
            return Err(ScoringError::InvalidResponse(
                "No JSON object in evaluator response".to_string(),
            ))
        }
    };

    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| ScoringError::InvalidResponse(format!("Failed to parse scores: {}", e)))?;

    let mut scores = BTreeMap::new();
    for (name, value) in raw {
        let score = value.as_f64().ok_or_else(|| {
            ScoringError::InvalidResponse(format!("Score '{}' is not a number", name))
        })?;
        if !(0.0..=1.0).contains(&score) {
            return Err(ScoringError::InvalidResponse(format!(
                "Score '{}' out of range: {}",
                name, score
            )));
        }
        scores.insert(name, score as f32);
    }

    if !scores.contains_key(RELEVANCE) {
        return Err(ScoringError::InvalidResponse(
            "Missing relevance score".to_string(),
        ));
    }

    Ok(AuditResult::from_scores(scores))
}

#[async_trait]
impl QualityScorer for LlmScorer {
    async fn audit_content(
        &self,
        candidate: &CandidateItem,
        context: &BusinessContext,
        existing: &[&ExistingItem],
    ) -> Result<AuditResult, ScoringError> {
        debug!("Scoring candidate {} via {}", candidate.id, self.config.model);

        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: self.build_prompt(candidate, context, existing),
                },
            ],
            temperature: Some(self.config.temperature),
        };

        let mut req = self.client.post(&self.config.endpoint).json(&request);

        if let Some(ref api_key) = self.config.api_key {
            req = req.bearer_auth(api_key.expose_secret());
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ScoringError::Timeout(e.to_string())
            } else {
                ScoringError::Evaluator(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoringError::Evaluator(format!("HTTP {}: {}", status, body)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ScoringError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let choice = completion
            .choices
            .first()
            .ok_or_else(|| ScoringError::InvalidResponse("No choices in response".to_string()))?;

        parse_scores(&choice.message.content)
    }
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::models::ContentKind;

    fn completion_body(content: &str) -> String {
        serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
        .to_string()
    }

    fn scorer_for(url: String) -> LlmScorer {
        let config = ScorerConfig {
            endpoint: url,
            ..ScorerConfig::default()
        };
        LlmScorer::new(config).unwrap()
    }

    #[test]
    fn test_parse_scores_from_fenced_json() {
        let result = parse_scores("```json\n{\"relevance\": 0.8, \"novelty\": 0.4}\n```").unwrap();
        assert!((result.average_score - 0.6).abs() < 1e-6);
        assert_eq!(result.relevance(), 0.8);
    }

    #[test]
    fn test_parse_scores_rejects_missing_relevance() {
        let err = parse_scores("{\"novelty\": 0.4}").unwrap_err();
        assert!(matches!(err, ScoringError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_scores_rejects_out_of_range() {
        let err = parse_scores("{\"relevance\": 7}").unwrap_err();
        assert!(matches!(err, ScoringError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_scores_from_evaluator() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(completion_body(
                "{\"relevance\": 0.9, \"specificity\": 0.6, \"novelty\": 0.3}",
            ))
            .create_async()
            .await;

        let scorer = scorer_for(format!("{}/v1/chat/completions", server.url()));
        let item = CandidateItem::new("1", ContentKind::Mission, "Subir precio de X");
        let ctx = BusinessContext::fallback("b", "ventas");

        let result = scorer.audit_content(&item, &ctx, &[]).await.unwrap();
        mock.assert_async().await;
        assert_eq!(result.relevance(), 0.9);
        assert!((result.average_score - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_a_low_score() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let scorer = scorer_for(format!("{}/v1/chat/completions", server.url()));
        let item = CandidateItem::new("1", ContentKind::Insight, "Reducir costos fijos");
        let ctx = BusinessContext::fallback("b", "costos");

        let err = scorer.audit_content(&item, &ctx, &[]).await.unwrap_err();
        assert!(matches!(err, ScoringError::Evaluator(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_prompt_excludes_candidate_from_existing() {
        let scorer = scorer_for("http://localhost:1".to_string());
        let item = CandidateItem::new("1", ContentKind::Mission, "Subir precio de X");
        let ctx = BusinessContext::fallback("b", "ventas");
        let own = ExistingItem {
            id: "1".to_string(),
            kind: ContentKind::Mission,
            title: "Subir precio de X".to_string(),
            description: String::new(),
            concept_hash: String::new(),
            intent_signature: String::new(),
            created_at: chrono::Utc::now(),
        };

        let prompt = scorer.build_prompt(&item, &ctx, &[&own]);
        assert!(prompt.contains("(none)"));
    }
}
