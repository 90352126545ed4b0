use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use crate::config::{ProviderConfig, ProviderKind};
use crate::logging::get_logger;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Common interface for all language-model providers
#[async_trait]
pub trait AIProvider: Send + Sync {
    /// Ask the model one question under the given system instruction
    async fn generate_response(&self, prompt: &str, system_instruction: &str) -> Result<String>;

    /// Models usable with the configured key
    async fn list_models(&self) -> Result<Vec<String>>;

    fn get_name(&self) -> &'static str;

    fn model(&self) -> &str;
}

/// Build the provider selected in the configuration
pub fn build_provider(config: &ProviderConfig, timeout: Duration) -> Box<dyn AIProvider> {
    let client = http_client(timeout);
    let key = config.api_key.clone();
    let model = config.model.clone();

    match config.provider {
        ProviderKind::Google => Box::new(GeminiProvider::new(client, key, model)),
        ProviderKind::OpenAI => Box::new(OpenAICompatibleProvider::openai(client, key, model)),
        ProviderKind::Groq => Box::new(OpenAICompatibleProvider::groq(client, key, model)),
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(client, key, model)),
    }
}

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Ask the provider and record the round trip in the error log
pub async fn ask(provider: &dyn AIProvider, prompt: &str, system_instruction: &str) -> Result<String> {
    let started = Instant::now();
    let result = provider.generate_response(prompt, system_instruction).await;
    let elapsed = started.elapsed().as_millis() as u64;

    if let Ok(logger) = get_logger() {
        if let Ok(logger_guard) = logger.lock() {
            let _ = logger_guard.log_provider_operation(
                provider.get_name(),
                provider.model(),
                "generate",
                elapsed,
                result.is_ok(),
            );
        }
    }

    result
}

/// Send a request and decode the JSON body, turning failures into errors whose
/// wording the error classifier understands.
async fn send_json(name: &str, model: &str, request: RequestBuilder) -> Result<Value> {
    let response = request.send().await.map_err(|e| transport_error(name, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(name, model, status, &body));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| anyhow!("Failed to parse {} response: {}", name, e))
}

fn transport_error(name: &str, e: reqwest::Error) -> anyhow::Error {
    if e.is_timeout() {
        anyhow!("Request to {} timed out: {}", name, e)
    } else if e.is_connect() {
        anyhow!("Network error: connection to {} failed: {}", name, e)
    } else {
        anyhow!("Network error while talking to {}: {}", name, e)
    }
}

/// Map an HTTP error status to an error message
pub fn status_error(name: &str, model: &str, status: StatusCode, body: &str) -> anyhow::Error {
    let detail = error_detail(body);
    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            anyhow!("{} rate limit or quota exceeded (HTTP 429): {}", name, detail)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            anyhow!("{} rejected the API key: unauthorized (HTTP {}): {}", name, status.as_u16(), detail)
        }
        StatusCode::NOT_FOUND => {
            anyhow!("{} model '{}' not found (HTTP 404)", name, model)
        }
        _ => anyhow!("{} returned HTTP {}: {}", name, status.as_u16(), detail),
    }
}

/// The human-readable part of a provider error body
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["error"].as_str())
                .or_else(|| v[0]["error"]["message"].as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().chars().take(300).collect())
}

/// Google Gemini via the Generative Language API
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    pub fn request_body(prompt: &str, system_instruction: &str) -> Value {
        json!({
            "systemInstruction": {
                "parts": [{ "text": system_instruction }]
            },
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "maxOutputTokens": MAX_OUTPUT_TOKENS
            }
        })
    }

    pub fn parse_reply(json: &Value) -> Result<String> {
        let parts = json["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| {
                let reason = json["promptFeedback"]["blockReason"].as_str().unwrap_or("no candidates");
                anyhow!("Gemini returned no answer ({})", reason)
            })?;

        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if text.is_empty() {
            return Err(anyhow!("Gemini returned an empty answer"));
        }
        Ok(text)
    }

    pub fn parse_models(json: &Value) -> Vec<String> {
        json["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter(|m| {
                        m["supportedGenerationMethods"]
                            .as_array()
                            .map(|methods| methods.iter().any(|x| x == "generateContent"))
                            .unwrap_or(false)
                    })
                    .filter_map(|m| m["name"].as_str())
                    .map(|name| name.trim_start_matches("models/").to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    async fn generate_response(&self, prompt: &str, system_instruction: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let request = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(prompt, system_instruction));

        let json = send_json(self.get_name(), &self.model, request).await?;
        Self::parse_reply(&json)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models?pageSize=1000", self.base_url);
        let request = self.client.get(&url).header("x-goog-api-key", &self.api_key);

        let json = send_json(self.get_name(), &self.model, request).await?;
        Ok(Self::parse_models(&json))
    }

    fn get_name(&self) -> &'static str {
        "Google"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// OpenAI and Groq, which share the chat-completions wire format
pub struct OpenAICompatibleProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    name: &'static str,
}

impl OpenAICompatibleProvider {
    pub fn openai(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: OPENAI_API_BASE.to_string(),
            name: "OpenAI",
        }
    }

    pub fn groq(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: GROQ_API_BASE.to_string(),
            name: "Groq",
        }
    }

    pub fn request_body(model: &str, prompt: &str, system_instruction: &str) -> Value {
        json!({
            "model": model,
            "messages": [
                { "role": "system", "content": system_instruction },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": MAX_OUTPUT_TOKENS
        })
    }

    pub fn parse_reply(name: &str, json: &Value) -> Result<String> {
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Unexpected response format from {}", name))
    }

    pub fn parse_models(json: &Value) -> Vec<String> {
        json["data"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .filter_map(|m| m["id"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl AIProvider for OpenAICompatibleProvider {
    async fn generate_response(&self, prompt: &str, system_instruction: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&Self::request_body(&self.model, prompt, system_instruction));

        let json = send_json(self.name, &self.model, request).await?;
        Self::parse_reply(self.name, &json)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let request = self.client.get(&url).bearer_auth(&self.api_key);

        let json = send_json(self.name, &self.model, request).await?;
        Ok(Self::parse_models(&json))
    }

    fn get_name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Anthropic Messages API
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicProvider {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
            base_url: ANTHROPIC_API_BASE.to_string(),
        }
    }

    pub fn request_body(model: &str, prompt: &str, system_instruction: &str) -> Value {
        json!({
            "model": model,
            "max_tokens": MAX_OUTPUT_TOKENS,
            "system": system_instruction,
            "messages": [{ "role": "user", "content": prompt }]
        })
    }

    pub fn parse_reply(json: &Value) -> Result<String> {
        let blocks = json["content"]
            .as_array()
            .ok_or_else(|| anyhow!("Unexpected response format from Anthropic"))?;

        let text: String = blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect();

        if text.is_empty() {
            return Err(anyhow!("Anthropic returned an empty answer"));
        }
        Ok(text)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
    }
}

#[async_trait]
impl AIProvider for AnthropicProvider {
    async fn generate_response(&self, prompt: &str, system_instruction: &str) -> Result<String> {
        let url = format!("{}/messages", self.base_url);
        let request = self
            .authorized(self.client.post(&url))
            .json(&Self::request_body(&self.model, prompt, system_instruction));

        let json = send_json(self.get_name(), &self.model, request).await?;
        Self::parse_reply(&json)
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let request = self.authorized(self.client.get(&url));

        let json = send_json(self.get_name(), &self.model, request).await?;
        Ok(OpenAICompatibleProvider::parse_models(&json))
    }

    fn get_name(&self) -> &'static str {
        "Anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Known free-tier limits as (requests per minute, requests per day), by model prefix
const FREE_TIER_LIMITS: &[(&str, u32, u32)] = &[
    ("gemini-2.5-flash", 10, 20),
    ("gemini-2.5-pro", 5, 25),
    ("gemini-2.0-flash-lite", 30, 1500),
    ("gemini-2.0-flash", 15, 1500),
    ("gemini-1.5-flash", 15, 1500),
    ("gemini-1.5-pro", 2, 50),
    ("llama-3.1-8b-instant", 30, 14400),
];

/// Free-tier limits for a model, matched on the longest known prefix
pub fn known_limits(model: &str) -> Option<(u32, u32)> {
    FREE_TIER_LIMITS
        .iter()
        .filter(|(prefix, _, _)| model.starts_with(prefix))
        .max_by_key(|(prefix, _, _)| prefix.len())
        .map(|&(_, rpm, rpd)| (rpm, rpd))
}
