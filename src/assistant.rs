//! The conversational backend behind the cooking assistant.

use std::time::Duration;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::{config::AssistantConfig, route::chat::model::ContextMessage};

const MAX_TOKENS: u32 = 300;
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("assistant rate limit reached")]
	RateLimited,
	#[error("assistant rejected the credentials")]
	AuthFailed,
	#[error("assistant did not answer in time")]
	Timeout,
	#[error("assistant rejected the request: {0}")]
	InvalidRequest(String),
	#[error("assistant failure: {0}")]
	Other(String),
}

/// Produces one reply for an ordered conversation.
#[axum::async_trait]
pub trait Assistant: Send + Sync {
	async fn complete(&self, messages: &[ContextMessage]) -> Result<String, Error>;
}

/// Client for an OpenAI compatible chat completions endpoint.
pub struct OpenAiAssistant {
	client: reqwest::Client,
	endpoint: String,
	api_key: String,
	model: String,
}

impl OpenAiAssistant {
	pub fn new(config: &AssistantConfig) -> Result<Self, Error> {
		let client = reqwest::Client::builder()
			.timeout(config.timeout)
			.connect_timeout(Duration::from_secs(10))
			.build()
			.map_err(|e| Error::Other(e.to_string()))?;

		Ok(Self {
			client,
			endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
			api_key: config.api_key.clone(),
			model: config.model.clone(),
		})
	}
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
	model: &'a str,
	messages: &'a [ContextMessage],
	max_tokens: u32,
	temperature: f32,
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
	content: String,
}

fn classify(status: StatusCode, body: String) -> Error {
	match status {
		StatusCode::TOO_MANY_REQUESTS => Error::RateLimited,
		StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::AuthFailed,
		StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => Error::Timeout,
		status if status.is_client_error() => Error::InvalidRequest(body),
		status => Error::Other(format!("{status}: {body}")),
	}
}

impl From<reqwest::Error> for Error {
	fn from(error: reqwest::Error) -> Self {
		if error.is_timeout() {
			Self::Timeout
		} else {
			Self::Other(error.to_string())
		}
	}
}

#[axum::async_trait]
impl Assistant for OpenAiAssistant {
	async fn complete(&self, messages: &[ContextMessage]) -> Result<String, Error> {
		let response = self
			.client
			.post(&self.endpoint)
			.bearer_auth(&self.api_key)
			.json(&CompletionRequest {
				model: &self.model,
				messages,
				max_tokens: MAX_TOKENS,
				temperature: TEMPERATURE,
			})
			.send()
			.await?;

		let status = response.status();

		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();

			return Err(classify(status, body));
		}

		let completion = response.json::<CompletionResponse>().await?;

		completion
			.choices
			.into_iter()
			.next()
			.map(|choice| choice.message.content.trim().to_owned())
			.filter(|reply| !reply.is_empty())
			.ok_or_else(|| Error::Other("empty completion".into()))
	}
}
