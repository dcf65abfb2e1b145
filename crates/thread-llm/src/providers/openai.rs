use async_trait::async_trait;
use reqwest::Client;

use crate::provider::{GenerationError, GenerationProvider, GenerationStream, Result};
use crate::request::GenerationRequest;

use super::common::openai_compat::build_openai_compat_body;
use super::common::sse::completion_stream;

/// Any endpoint speaking the OpenAI chat-completions streaming protocol
pub struct OpenAICompatProvider {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl OpenAICompatProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: Some(api_key.into()),
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
        }
    }

    /// Provider for a local endpoint that takes no key
    pub fn anonymous() -> Self {
        Self {
            api_key: None,
            ..Self::new(String::new())
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn model_for<'a>(&'a self, request: &'a GenerationRequest) -> &'a str {
        let requested = request.config.base_model.trim();
        if requested.is_empty() {
            &self.model
        } else {
            requested
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAICompatProvider {
    async fn generate_stream(&self, request: &GenerationRequest) -> Result<GenerationStream> {
        let model = self.model_for(request);
        log::debug!(
            "Requesting completion from {} with model '{}' ({} prompt messages)",
            self.base_url,
            model,
            request.messages.len()
        );

        let body = build_openai_compat_body(model, request);

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", api_key));
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await?;
            return Err(GenerationError::Api(format!("HTTP {}: {}", status, text)));
        }

        Ok(completion_stream(response))
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
