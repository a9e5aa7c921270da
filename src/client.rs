use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::error::{CaptionError, Result};
use crate::selection::SavedPrompt;
use crate::types::{ImageFile, PromptRequest};
use crate::CaptionBackend;

/// Async client for the caption service.
///
/// One method call is one HTTP request; nothing here retries.
///
/// # Example
/// ```no_run
/// use caption_batch::{CaptionClient, ClientConfig, ImageFile, PromptRequest};
///
/// # async fn example() -> caption_batch::Result<()> {
/// let client = CaptionClient::new(ClientConfig::from_env());
/// let file = ImageFile::new("cat.png", std::fs::read("cat.png").unwrap());
/// let caption = client
///     .submit(&file, &PromptRequest::free("Describe the image."), "llava")
///     .await?;
/// println!("{}", caption);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CaptionClient {
    http: Client,
    config: ClientConfig,
}

impl CaptionClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base, path)
    }

    fn unreachable(&self, e: reqwest::Error) -> CaptionError {
        CaptionError::Transport {
            status: None,
            message: format!(
                "Failed to reach caption service at {}: {}",
                self.config.api_base, e
            ),
        }
    }

    // ── Captioning ──────────────────────────────────────────────────

    /// Caption one image.
    ///
    /// The model and prompt are validated before anything is sent. A 2xx
    /// answer whose body is not JSON, or lacks a string `output`, yields an
    /// empty caption rather than an error.
    pub async fn submit(
        &self,
        file: &ImageFile,
        prompt: &PromptRequest,
        model: &str,
    ) -> Result<String> {
        let model = model.trim();
        if model.is_empty() {
            return Err(CaptionError::Validation(
                "Select an Ollama model before generating.".into(),
            ));
        }

        let prompt_text = prompt.text.trim();
        if prompt_text.is_empty() {
            return Err(CaptionError::Validation(
                "Provide prompt text before generating.".into(),
            ));
        }

        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str(file.mime())
            .map_err(|e| {
                CaptionError::Validation(format!("Invalid MIME type '{}': {}", file.mime(), e))
            })?;

        let mut form = Form::new().part("file", part);
        if let Some(id) = prompt.prompt_id.as_deref().filter(|id| !id.is_empty()) {
            form = form.text("prompt_id", id.to_string());
        }
        let form = form
            .text("prompt_text", prompt_text.to_string())
            .text("model", model.to_string());

        tracing::debug!(
            file = file.name(),
            bytes = file.len(),
            model,
            saved_prompt = prompt.prompt_id.is_some(),
            "submitting caption request"
        );

        let resp = self
            .http
            .post(self.url("generate"))
            .timeout(self.config.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = error_detail(resp)
                .await
                .unwrap_or_else(|| format!("Generation failed ({})", status));
            return Err(CaptionError::transport(status, message));
        }

        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| CaptionError::Transport {
            status: Some(status),
            message: format!("Failed to read caption response: {}", e),
        })?;

        Ok(parse_output(&body))
    }

    // ── Catalog ─────────────────────────────────────────────────────

    /// Model names available on the backend.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(self.url("models"))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(CaptionError::transport(
                status,
                format!("Failed to fetch models ({})", status),
            ));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|_| CaptionError::Protocol("Unexpected response when loading models.".into()))?;
        serde_json::from_value(json)
            .map_err(|_| CaptionError::Protocol("Unexpected response when loading models.".into()))
    }

    /// Saved prompts known to the backend.
    pub async fn list_prompts(&self) -> Result<Vec<SavedPrompt>> {
        let resp = self
            .http
            .get(self.url("prompts"))
            .timeout(self.config.timeout)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            return Err(CaptionError::transport(
                status,
                format!("Failed to fetch prompts ({})", status),
            ));
        }

        let json: Value = resp.json().await.map_err(|_| {
            CaptionError::Protocol("Unexpected response when loading prompts.".into())
        })?;
        serde_json::from_value(json).map_err(|_| {
            CaptionError::Protocol("Unexpected response when loading prompts.".into())
        })
    }

    /// Store a new saved prompt. Label and prompt are trimmed and both required.
    pub async fn create_prompt(&self, label: &str, prompt: &str) -> Result<SavedPrompt> {
        let label = label.trim();
        let prompt = prompt.trim();
        if label.is_empty() || prompt.is_empty() {
            return Err(CaptionError::Validation(
                "Label and prompt are required.".into(),
            ));
        }

        let resp = self
            .http
            .post(self.url("prompts"))
            .timeout(self.config.timeout)
            .json(&json!({ "label": label, "prompt": prompt }))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = error_detail(resp)
                .await
                .unwrap_or_else(|| format!("Failed to save prompt ({})", status));
            return Err(CaptionError::transport(status, message));
        }

        let json: Value = resp
            .json()
            .await
            .map_err(|e| CaptionError::Protocol(format!("Invalid prompt response: {}", e)))?;
        Ok(serde_json::from_value(json)?)
    }

    // ── Health ──────────────────────────────────────────────────────

    /// Check whether the caption service answers `/health`.
    pub async fn health(&self) -> Result<bool> {
        let resp = self
            .http
            .get(self.url("health"))
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        Ok(resp.status().is_success())
    }
}

impl CaptionBackend for CaptionClient {
    async fn caption(
        &self,
        file: &ImageFile,
        prompt: &PromptRequest,
        model: &str,
    ) -> Result<String> {
        self.submit(file, prompt, model).await
    }
}

/// String `detail` from a JSON error body, if the body has one.
async fn error_detail(resp: Response) -> Option<String> {
    let json: Value = resp.json().await.ok()?;
    json.get("detail")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

/// String `output` of a success body; anything else reads as an empty caption.
fn parse_output(body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("output")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_default()
}
