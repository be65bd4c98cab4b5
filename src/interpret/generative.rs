use super::{GenerativeOptions, Interpretation, InterpretationRequest, InterpretError, Interpreter};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Google Generative Language `generateContent` client.
pub struct GenerativeInterpreter {
    endpoint: String,
    model: String,
    api_key: String,
    prompt: String,
    attach_image: bool,
    client: reqwest::Client,
}

impl GenerativeInterpreter {
    pub fn new(options: &GenerativeOptions) -> Result<Self, InterpretError> {
        let api_key = options
            .api_key
            .clone()
            .ok_or_else(|| InterpretError::NotConfigured("missing API key".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(options.timeout())
            .build()
            .map_err(|e| InterpretError::NotConfigured(e.to_string()))?;

        Ok(Self {
            endpoint: options.endpoint.trim_end_matches('/').to_string(),
            model: options.model.clone(),
            api_key,
            prompt: options.prompt.clone(),
            attach_image: options.attach_image,
            client,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[async_trait]
impl Interpreter for GenerativeInterpreter {
    fn needs_raster(&self) -> bool {
        self.attach_image
    }

    async fn interpret(
        &self,
        request: &InterpretationRequest,
    ) -> Result<Interpretation, InterpretError> {
        let prompt = request.fill(&self.prompt);
        let mut parts = vec![Part::Text {
            text: prompt.clone(),
        }];

        if self.attach_image {
            if let Some(path) = &request.raster {
                let png = tokio::fs::read(path).await?;
                parts.push(Part::InlineData {
                    inline_data: InlineData {
                        mime_type: "image/png",
                        data: base64::engine::general_purpose::STANDARD.encode(&png),
                    },
                });
            }
        }

        // Lengths only; prompt and answer content stay out of the logs.
        let with_image = parts.len() > 1;
        info!(
            op = "interpret.generative.request",
            model = %self.model,
            prompt_len = prompt.len(),
            with_image,
            "Generative interpretation request"
        );

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts,
            }],
        };

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InterpretError::Timeout
                } else {
                    InterpretError::Request(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {}", status.as_u16()));
            warn!(
                op = "interpret.generative.error",
                status = status.as_u16(),
                "Generative API request failed"
            );
            return Err(InterpretError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| InterpretError::Request(format!("failed to parse response: {}", e)))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or(InterpretError::EmptyResponse)?;
        let finish_reason = candidate.finish_reason.unwrap_or_else(|| "none".to_string());
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(InterpretError::EmptyResponse);
        }

        info!(
            op = "interpret.generative.response",
            response_len = text.len(),
            finish_reason = %finish_reason,
            "Generative interpretation response"
        );

        Ok(Interpretation::Text(text))
    }

    fn name(&self) -> &'static str {
        "generative"
    }
}
