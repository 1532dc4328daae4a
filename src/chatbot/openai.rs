//! OpenAI client: Whisper transcription and chat completions.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chatbot::error::BotError;
use crate::chatbot::services::{Completer, Transcriber};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

pub struct OpenAiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
    chat_model: String,
    transcription_model: String,
    system_prompt: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
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
struct TranscriptionResponse {
    text: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, http: reqwest::Client) -> Self {
        Self {
            api_key,
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            system_prompt: None,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_models(mut self, chat_model: String, transcription_model: String) -> Self {
        self.chat_model = chat_model;
        self.transcription_model = transcription_model;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt;
        self
    }

    fn chat_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(ref system) = self.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
        });
        ChatRequest {
            model: &self.chat_model,
            messages,
        }
    }
}

#[async_trait]
impl Completer for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, BotError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.chat_request(prompt))
            .send()
            .await
            .map_err(|e| BotError::Completion(format!("HTTP error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Completion(api_error(status, &body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| BotError::Completion(format!("Parse error: {e}")))?;
        first_choice(parsed)
    }
}

#[async_trait]
impl Transcriber for OpenAiClient {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, BotError> {
        debug!("Whisper: uploading {} bytes", audio.len());

        let file = Part::bytes(audio.to_vec())
            .file_name("audio.ogg")
            .mime_str("audio/ogg")
            .map_err(|e| BotError::Transcription(format!("Bad MIME type: {e}")))?;
        let form = Form::new()
            .text("model", self.transcription_model.clone())
            .part("file", file);

        let response = self
            .http
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| BotError::Transcription(format!("HTTP error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Transcription(api_error(status, &body)));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| BotError::Transcription(format!("Parse error: {e}")))?;
        Ok(parsed.text.trim().to_string())
    }
}

fn first_choice(response: ChatResponse) -> Result<String, BotError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .ok_or_else(|| BotError::Completion("Empty response".to_string()))
}

/// Prefer the API's own error message over the raw body.
fn api_error(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => format!("API error {status}: {}", parsed.error.message),
        Err(_) => format!("API error {status}: {body}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OpenAiClient {
        OpenAiClient::new("sk-test".to_string(), reqwest::Client::new())
    }

    #[test]
    fn test_defaults() {
        let c = client();
        assert_eq!(c.base_url, DEFAULT_BASE_URL);
        assert_eq!(c.chat_model, "gpt-3.5-turbo");
        assert_eq!(c.transcription_model, "whisper-1");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let c = client().with_base_url("http://localhost:8080/v1/");
        assert_eq!(c.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_chat_request_is_single_user_message() {
        let c = client();
        let body = serde_json::to_value(c.chat_request("hola")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "gpt-3.5-turbo",
                "messages": [{ "role": "user", "content": "hola" }]
            })
        );
    }

    #[test]
    fn test_chat_request_with_system_prompt() {
        let c = client().with_system_prompt(Some("Eres Sofía.".to_string()));
        let body = serde_json::to_value(c.chat_request("hola")).unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Eres Sofía.");
        assert_eq!(body["messages"][1]["content"], "hola");
    }

    #[test]
    fn test_first_choice_trims() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"  ¡Hola! ¿Cómo estás?\n"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_choice(resp).unwrap(), "¡Hola! ¿Cómo estás?");
    }

    #[test]
    fn test_first_choice_empty() {
        let resp: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(first_choice(resp), Err(BotError::Completion(_))));

        let resp: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(first_choice(resp).is_err());
    }

    #[test]
    fn test_api_error_message() {
        let status = reqwest::StatusCode::UNAUTHORIZED;
        let msg = api_error(status, r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#);
        assert_eq!(msg, "API error 401 Unauthorized: Incorrect API key provided");

        let msg = api_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(msg, "API error 502 Bad Gateway: upstream down");
    }
}
