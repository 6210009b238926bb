//! Blocking client for OpenAI-compatible `/chat/completions` endpoints.

use crate::error::{LlmError, Result};
use deck_core::translate::prompt;
use deck_core::{BatchRequest, ChatMessage, Rephraser, Translator};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const MODEL_ENV: &str = "OPENAI_TRANSLATE_MODEL";

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Sampling temperature used when shortening lines.
const SHORTEN_TEMPERATURE: f32 = 0.2;

/// Connection settings.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    /// Model used when a request does not name one.
    pub model: String,
    pub timeout: Duration,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Settings from `OPENAI_API_KEY`, `OPENAI_BASE_URL` and
    /// `OPENAI_TRANSLATE_MODEL`.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey(API_KEY_ENV))?;
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            config = config.with_base_url(url);
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            config = config.with_model(model);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        if !model.trim().is_empty() {
            self.model = model;
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Per-call completion settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    /// Overrides the configured model.
    pub model: Option<String>,
    pub temperature: Option<f32>,
}

/// A chat model answering with a JSON object.
pub trait ChatCompletion {
    fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String>;
}

/// `gpt-5` family models only accept their default temperature.
pub fn supports_temperature(model: &str) -> bool {
    !model.trim().to_ascii_lowercase().starts_with("gpt-5")
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

fn request_body<'a>(
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: Option<f32>,
) -> CompletionRequest<'a> {
    CompletionRequest {
        model,
        messages,
        temperature: temperature.filter(|_| supports_temperature(model)),
        response_format: ResponseFormat { kind: "json_object" },
    }
}

/// Message content of the first choice.
pub fn parse_completion(body: &str) -> Result<String> {
    let response: CompletionResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)
}

fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api) => api.error.message,
        Err(_) => format!("API request failed with status {}: {}", status, body),
    }
}

/// Client for one OpenAI-compatible endpoint.
pub struct OpenAiClient {
    config: LlmConfig,
    http: Client,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey(API_KEY_ENV));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }
}

impl ChatCompletion for OpenAiClient {
    fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String> {
        let model = options
            .model
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(&self.config.model);
        let body = request_body(model, messages, options.temperature);
        log::debug!("POST {} ({}, {} messages)", self.config.endpoint(), model, messages.len());

        let response = self
            .http
            .post(self.config.endpoint())
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(LlmError::ApiError {
                status,
                message: api_error_message(status, &text),
            });
        }
        parse_completion(&text)
    }
}

/// Batch reply content for the translation protocol.
///
/// An empty completion is handed on as empty content so that it fails
/// decoding and goes through the corrective retry like any other malformed
/// reply. Transport and API errors stay errors.
fn batch_content(completion: Result<String>) -> deck_core::Result<String> {
    match completion {
        Ok(content) => Ok(content),
        Err(LlmError::EmptyResponse) => {
            log::debug!("Completion had no content");
            Ok(String::new())
        }
        Err(e) => Err(e.into()),
    }
}

impl Translator for OpenAiClient {
    fn translate_batch(&self, request: &BatchRequest<'_>) -> deck_core::Result<String> {
        let options = CompletionOptions {
            model: Some(request.config.model_id.clone()),
            temperature: Some(request.config.temperature),
        };
        batch_content(self.complete(request.messages, &options))
    }
}

/// The `result` string of a shortening reply.
pub fn parse_shortened(content: &str) -> deck_core::Result<String> {
    let snippet = || content.chars().take(200).collect::<String>();
    let value: Value = serde_json::from_str(content).map_err(|e| deck_core::Error::TranslationParse {
        reason: e.to_string(),
        snippet: snippet(),
    })?;
    match value.get("result") {
        Some(Value::String(text)) => Ok(text.clone()),
        _ => Err(deck_core::Error::TranslationParse {
            reason: "missing string field `result`".to_string(),
            snippet: snippet(),
        }),
    }
}

impl Rephraser for OpenAiClient {
    fn shorten(&self, text: &str, max_chars: usize) -> deck_core::Result<String> {
        let messages = prompt::shorten_messages(text, max_chars);
        let options = CompletionOptions {
            model: None,
            temperature: Some(SHORTEN_TEMPERATURE),
        };
        let content = self.complete(&messages, &options)?;
        parse_shortened(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deck_core::{TranslationBatcher, TranslationConfig};
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};

    #[test]
    fn test_request_body_omits_temperature_for_gpt5() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = serde_json::to_value(request_body("gpt-4o-mini", &messages, Some(0.1))).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("temperature").is_some());

        let body = serde_json::to_value(request_body("GPT-5-mini", &messages, Some(0.1))).unwrap();
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"result\":[\"안녕\"]}"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), r#"{"result":["안녕"]}"#);

        let empty = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        assert!(matches!(parse_completion(empty), Err(LlmError::EmptyResponse)));
        assert!(matches!(parse_completion("<html>"), Err(LlmError::JsonDeserialization(_))));
    }

    #[test]
    fn test_empty_completion_becomes_empty_batch_content() {
        assert_eq!(batch_content(Err(LlmError::EmptyResponse)).unwrap(), "");
        assert_eq!(batch_content(Ok("{}".into())).unwrap(), "{}");
        let err = batch_content(Err(LlmError::MissingApiKey(API_KEY_ENV))).unwrap_err();
        assert!(matches!(err, deck_core::Error::MissingCredentials(_)));
    }

    /// Serves the given completion bodies, one per connection.
    fn serve(bodies: &'static [&'static str]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            for body in bodies {
                let (mut stream, _) = listener.accept().unwrap();
                read_request(&mut stream);
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
        });
        format!("http://{}/v1", addr)
    }

    fn read_request(stream: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            let Some(head_end) = text.find("\r\n\r\n") else { continue };
            let length = text[..head_end]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + length {
                return;
            }
        }
    }

    #[test]
    fn test_empty_completion_is_retried_by_batcher() {
        let base_url = serve(&[
            r#"{"choices":[{"message":{"role":"assistant","content":""}}]}"#,
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"result\":[\"A\"]}"}}]}"#,
        ]);
        let client = OpenAiClient::new(LlmConfig::new("sk-test").with_base_url(base_url)).unwrap();
        let out = TranslationBatcher::new(&client)
            .translate_all(&["a".to_string()], &TranslationConfig::default())
            .unwrap();
        assert_eq!(out, vec!["A"]);
    }

    #[test]
    fn test_api_error_message() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(status, body), "Incorrect API key provided");
        assert!(api_error_message(status, "nope").contains("401"));
    }

    #[test]
    fn test_parse_shortened() {
        assert_eq!(parse_shortened(r#"{"result": "짧게"}"#).unwrap(), "짧게");
        assert!(matches!(
            parse_shortened(r#"{"result": ["a"]}"#),
            Err(deck_core::Error::TranslationParse { .. })
        ));
        assert!(parse_shortened("plain text").is_err());
    }

    #[test]
    fn test_config() {
        let config = LlmConfig::new("sk-test")
            .with_base_url("http://localhost:8080/v1/")
            .with_model("")
            .with_timeout(Duration::from_secs(5));
        assert_eq!(config.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(!format!("{:?}", config).contains("sk-test"));

        assert!(matches!(
            OpenAiClient::new(LlmConfig::new(" ")),
            Err(LlmError::MissingApiKey(_))
        ));
        let err: deck_core::Error = LlmError::MissingApiKey(API_KEY_ENV).into();
        assert!(matches!(err, deck_core::Error::MissingCredentials(_)));
    }
}
