use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{build_prompt, StructureError, Structurer, DEFAULT_SYSTEM_PROMPT};
use crate::config::StructurerConfig;

/// Structuring service backed by the Gemini `generateContent` REST API
pub struct GeminiStructurer {
    client: Client,
    endpoint: String,
    model: String,
    api_key: HeaderValue,
    system_prompt: String,
}

impl GeminiStructurer {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StructureError> {
        let mut api_key = HeaderValue::from_str(api_key.into().trim())
            .map_err(|_| StructureError::InvalidApiKey)?;
        api_key.set_sensitive(true);

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        })
    }

    /// Builds a client from configuration, reading the API key from the environment
    pub fn from_config(config: &StructurerConfig) -> Result<Self, StructureError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| StructureError::MissingApiKey(config.api_key_env.clone()))?;

        let structurer = Self::new(
            &config.endpoint,
            &config.model,
            api_key,
            Duration::from_secs(config.timeout_secs),
        )?;

        Ok(match &config.system_prompt {
            Some(prompt) => structurer.with_system_prompt(prompt),
            None => structurer,
        })
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    fn request_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }
}

#[async_trait]
impl Structurer for GeminiStructurer {
    async fn structure(&self, text: &str, source_url: &str) -> Result<String, StructureError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-goog-api-key", self.api_key.clone());

        let prompt = build_prompt(text, source_url);
        let body = GenerateRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &self.system_prompt,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart { text: &prompt }],
            }],
        };

        tracing::debug!(url = source_url, model = %self.model, "requesting structured output");

        let resp = self
            .client
            .post(self.request_url())
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(StructureError::Status { status, body });
        }

        let parsed: GenerateResponse = resp.json().await?;
        let answer = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(StructureError::EmptyResponse);
        }

        Ok(answer)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn structurer(server: &MockServer) -> GeminiStructurer {
        GeminiStructurer::new(
            server.uri(),
            "gemini-test",
            "secret-key",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_returns_candidate_text() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "secret-key"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "URL: https://site.example/a\n\nPage content:\nହେଲୋ"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "{\"title\":"}, {"text": " \"ହେଲୋ\"}"}]}
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = structurer(&server)
            .structure("ହେଲୋ", "https://site.example/a")
            .await
            .unwrap();

        assert_eq!(answer, "{\"title\": \"ହେଲୋ\"}");
    }

    #[tokio::test]
    async fn test_sends_system_instruction() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "systemInstruction": {"parts": [{"text": "Only JSON."}]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "{}"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let answer = structurer(&server)
            .with_system_prompt("Only JSON.")
            .structure("text", "https://site.example/")
            .await
            .unwrap();

        assert_eq!(answer, "{}");
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let err = structurer(&server)
            .structure("text", "https://site.example/")
            .await
            .unwrap_err();

        match err {
            StructureError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = structurer(&server)
            .structure("text", "https://site.example/")
            .await
            .unwrap_err();

        assert!(matches!(err, StructureError::EmptyResponse));
    }

    #[test]
    fn test_unsendable_api_key_rejected_at_construction() {
        let result = GeminiStructurer::new(
            "https://service.example",
            "gemini-test",
            "secret\nkey",
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(StructureError::InvalidApiKey)));
    }

    #[test]
    fn test_missing_api_key() {
        let config = StructurerConfig {
            api_key_env: "SITELINGO_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..StructurerConfig::default()
        };

        let result = GeminiStructurer::from_config(&config);
        assert!(matches!(result, Err(StructureError::MissingApiKey(_))));
    }
}
