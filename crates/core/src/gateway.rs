use crate::turn::Turn;
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: Turn,
}

/// Body of `POST /api/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub messages: Vec<Turn>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Credentials for the completion service are absent.
    #[error("{0}")]
    Configuration(String),
    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("at least one turn is required")]
    EmptyConversation,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

// The `ModelGateway` trait is the only way the session state machine reaches a
// language model. Every call carries the whole conversation; implementations keep
// no state between calls. Under test, `mockall` generates `MockModelGateway`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Returns the next turn for the given conversation.
    async fn complete(&self, turns: &[Turn]) -> Result<Turn, GatewayError>;
}

/// Pulls `choices[0].message` out of a chat-completions payload.
pub fn reply_from_payload(payload: Value) -> Result<Turn, GatewayError> {
    let resp: LlmResponse = serde_json::from_value(payload)
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
    resp.choices
        .into_iter()
        .next()
        .map(|choice| choice.message)
        .ok_or_else(|| GatewayError::InvalidResponse("No response from LLM".to_string()))
}

async fn read_json(resp: reqwest::Response) -> Result<(u16, Option<Value>), GatewayError> {
    let status = resp.status().as_u16();
    let bytes = resp.bytes().await?;
    Ok((status, serde_json::from_slice(&bytes).ok()))
}

/// Talks to an OpenAI-compatible `chat/completions` endpoint directly.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_key: Option<SecretString>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key,
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Sends the conversation upstream and returns the payload untouched.
    pub async fn forward(&self, turns: &[Turn]) -> Result<Value, GatewayError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| {
            GatewayError::Configuration("OPENAI_API_KEY not configured".to_string())
        })?;

        let body = serde_json::json!({
            "model": self.model,
            "messages": turns,
        });

        let resp = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let (status, data) = read_json(resp).await?;
        if !(200..300).contains(&status) {
            tracing::error!("OpenAI API error ({status}): {data:?}");
            let message = data
                .as_ref()
                .and_then(|d| d.pointer("/error/message"))
                .and_then(Value::as_str)
                .unwrap_or("OpenAI API error")
                .to_string();
            return Err(GatewayError::Upstream { status, message });
        }

        data.ok_or_else(|| GatewayError::InvalidResponse("upstream body is not JSON".to_string()))
    }
}

#[async_trait]
impl ModelGateway for OpenAiClient {
    async fn complete(&self, turns: &[Turn]) -> Result<Turn, GatewayError> {
        if turns.is_empty() {
            return Err(GatewayError::EmptyConversation);
        }
        let payload = self.forward(turns).await?;
        reply_from_payload(payload)
    }
}

/// Reaches the model through the `/api/ask` proxy, so clients never hold the key.
pub struct ProxyGateway {
    client: Client,
    base_url: String,
}

impl ProxyGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ModelGateway for ProxyGateway {
    async fn complete(&self, turns: &[Turn]) -> Result<Turn, GatewayError> {
        if turns.is_empty() {
            return Err(GatewayError::EmptyConversation);
        }

        let resp = self
            .client
            .post(format!("{}/api/ask", self.base_url.trim_end_matches('/')))
            .json(&serde_json::json!({ "messages": turns }))
            .send()
            .await?;

        let (status, data) = read_json(resp).await?;
        if !(200..300).contains(&status) {
            let message = data
                .as_ref()
                .and_then(|d| d.get("error"))
                .and_then(Value::as_str)
                .unwrap_or("proxy request failed")
                .to_string();
            return Err(GatewayError::Upstream { status, message });
        }

        let payload = data.ok_or_else(|| {
            GatewayError::InvalidResponse("proxy body is not JSON".to_string())
        })?;
        reply_from_payload(payload)
    }
}
