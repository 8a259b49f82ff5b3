use crate::domain::model::{ClassificationOutcome, ProductDescriptor, RiskLevel};
use crate::domain::ports::{Classifier, Credentials};
use crate::utils::error::{PatrolError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// 固定的系統指示：模型只能回傳兩個欄位的 JSON
pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert in detecting intellectual property infringement in marketplace listings.
Reply with JSON only: { "risk_level": "High" | "Medium" | "Low", "reason": "short reason" }
- High: obvious counterfeit brand goods or clear copyright infringement
- Medium: parody or grey-zone use of protected marks or characters
- Low: ordinary generic product"#;

/// 多模態模型分類客戶端
pub struct GeminiClassifier {
    client: Client,
    endpoint: String,
    model: String,
}

impl GeminiClassifier {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint, model))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    /// 下載商品圖片並轉為 inline data
    async fn fetch_image_part(&self, image_url: &str) -> Result<Value> {
        let response = self.client.get(image_url).send().await?.error_for_status()?;
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = response.bytes().await?;
        tracing::debug!("Fetched image {} ({} bytes, {})", image_url, bytes.len(), mime_type);

        Ok(json!({
            "inlineData": {
                "data": STANDARD.encode(&bytes),
                "mimeType": mime_type,
            }
        }))
    }

    fn build_request(item: &ProductDescriptor, image_part: Option<Value>) -> Value {
        let mut parts = vec![json!({ "text": format!("Product name: {}", item.name) })];
        if let Some(image_part) = image_part {
            parts.push(image_part);
        }

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
            "generationConfig": { "responseMimeType": "application/json" },
        })
    }
}

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    risk_level: String,
    #[serde(default)]
    reason: String,
}

/// 從模型回應取出 `{risk_level, reason}`
pub fn parse_model_response(body: &Value) -> Result<ClassificationOutcome> {
    let text = body
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| PatrolError::ClassificationError {
            message: "model response contained no text".to_string(),
        })?;

    let verdict: ModelVerdict =
        serde_json::from_str(text.trim()).map_err(|e| PatrolError::ClassificationError {
            message: format!("model reply is not the expected JSON: {}", e),
        })?;

    let risk_level = match RiskLevel::from_label(&verdict.risk_level) {
        Some(RiskLevel::Error) | None => {
            return Err(PatrolError::ClassificationError {
                message: format!("unknown risk level {:?}", verdict.risk_level),
            })
        }
        Some(level) => level,
    };

    Ok(ClassificationOutcome {
        risk_level,
        reason: verdict.reason,
    })
}

#[async_trait]
impl Classifier for GeminiClassifier {
    async fn classify(
        &self,
        item: &ProductDescriptor,
        credentials: &Credentials,
    ) -> Result<ClassificationOutcome> {
        let image_part = match item.image_url.as_deref() {
            Some(url) => Some(self.fetch_image_part(url).await?),
            None => None,
        };

        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", credentials.ai_api_key.as_str())
            .json(&Self::build_request(item, image_part))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PatrolError::ClassificationError {
                message: format!("model API returned {}", status),
            });
        }

        let body: Value = response.json().await?;
        parse_model_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classifier_client::ItemClassifierClient;
    use httpmock::prelude::*;
    use std::sync::Arc;

    fn credentials() -> Credentials {
        Credentials {
            marketplace_app_id: "app".to_string(),
            ai_api_key: "secret".to_string(),
        }
    }

    fn product(image_url: Option<String>) -> ProductDescriptor {
        ProductDescriptor {
            name: "Character keychain".to_string(),
            price_minor: 500,
            page_url: "https://item.example.com/k".to_string(),
            image_url,
        }
    }

    fn model_reply(text: &str) -> Value {
        json!({ "candidates": [{ "content": { "parts": [{ "text": text }] } }] })
    }

    #[test]
    fn test_parse_model_response() {
        let outcome =
            parse_model_response(&model_reply(r#"{"risk_level":"中","reason":"parody"}"#))
                .unwrap();
        assert_eq!(outcome.risk_level, RiskLevel::Medium);
        assert_eq!(outcome.reason, "parody");

        assert!(parse_model_response(&json!({"candidates": []})).is_err());
        assert!(parse_model_response(&model_reply("not json")).is_err());
        assert!(
            parse_model_response(&model_reply(r#"{"risk_level":"Severe","reason":""}"#)).is_err()
        );
    }

    #[tokio::test]
    async fn test_classify_with_inline_image() {
        let server = MockServer::start();
        let image_mock = server.mock(|when, then| {
            when.method(GET).path("/img/k.png");
            then.status(200)
                .header("Content-Type", "image/png")
                .body(vec![1u8, 2, 3]);
        });
        let model_mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1beta/models/test-model:generateContent")
                .header("x-goog-api-key", "secret")
                .body_contains("Character keychain")
                .body_contains("AQID")
                .body_contains("image/png");
            then.status(200)
                .json_body(model_reply(r#"{"risk_level":"High","reason":"licensed character"}"#));
        });

        let classifier = GeminiClassifier::new(
            server.url("/v1beta"),
            "test-model",
            Duration::from_secs(5),
        )
        .unwrap();
        let outcome = classifier
            .classify(&product(Some(server.url("/img/k.png"))), &credentials())
            .await
            .unwrap();

        image_mock.assert();
        model_mock.assert();
        assert_eq!(outcome.risk_level, RiskLevel::High);
        assert_eq!(outcome.reason, "licensed character");
    }

    #[tokio::test]
    async fn test_classify_non_success_is_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1beta/models/m:generateContent");
            then.status(403).json_body(json!({"error": {"message": "bad key"}}));
        });

        let classifier =
            GeminiClassifier::new(server.url("/v1beta"), "m", Duration::from_secs(5)).unwrap();
        let err = classifier
            .classify(&product(None), &credentials())
            .await
            .unwrap_err();

        assert!(matches!(err, PatrolError::ClassificationError { .. }));
    }

    #[tokio::test]
    async fn test_slow_model_times_out_without_exposing_api_key() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1beta/models/m:generateContent");
            then.status(200)
                .delay(Duration::from_secs(3))
                .json_body(model_reply(r#"{"risk_level":"Low","reason":"late"}"#));
        });

        let api_key = "SUPERSECRETKEY";
        let credentials = Credentials {
            marketplace_app_id: "app".to_string(),
            ai_api_key: api_key.to_string(),
        };
        let classifier =
            GeminiClassifier::new(server.url("/v1beta"), "m", Duration::from_secs(1)).unwrap();
        let client = ItemClassifierClient::new(Arc::new(classifier));

        let started = std::time::Instant::now();
        let outcome = client.classify(&product(None), &credentials).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(outcome.risk_level, RiskLevel::Error);
        assert!(
            !outcome.reason.contains(api_key),
            "reason leaked the api key: {}",
            outcome.reason
        );
        assert!(!outcome.reason.contains("generateContent"));
    }
}
