use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid value for {key}: {reason}")]
	Invalid { key: &'static str, reason: String },
	#[error("DATABASE_URL must be set unless STORE=memory")]
	MissingDatabaseUrl,
}

/// Where persisted state lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
	Postgres(String),
	Memory,
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
	pub api_key: String,
	pub model: String,
	pub base_url: String,
	pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
	pub host: String,
	pub port: u16,
	pub store: StoreConfig,
	/// `None` when no API key is configured; chat then reports itself unhealthy.
	pub assistant: Option<AssistantConfig>,
	pub upload_dir: PathBuf,
	pub upload_url_prefix: String,
	pub max_upload_bytes: usize,
}

impl Config {
	/// Reads the configuration from the environment. Call after `dotenvy` has
	/// loaded any `.env` file.
	pub fn load() -> Result<Self, Error> {
		let store = match var("STORE").as_deref() {
			Some("memory") => {
				warn!("STORE=memory, nothing will be persisted");
				StoreConfig::Memory
			}
			_ => StoreConfig::Postgres(var("DATABASE_URL").ok_or(Error::MissingDatabaseUrl)?),
		};

		let assistant = match var("OPENAI_API_KEY").filter(|key| !key.trim().is_empty()) {
			Some(api_key) => Some(AssistantConfig {
				api_key,
				model: try_load("OPENAI_MODEL", "gpt-3.5-turbo")?,
				base_url: try_load("OPENAI_BASE_URL", "https://api.openai.com/v1")?,
				timeout: Duration::from_secs(try_load("ASSISTANT_TIMEOUT_SECS", "30")?),
			}),
			None => {
				warn!("OPENAI_API_KEY not set, the chat assistant is disabled");
				None
			}
		};

		Ok(Self {
			host: try_load("HOST", "127.0.0.1")?,
			port: try_load("PORT", "3000")?,
			store,
			assistant,
			upload_dir: try_load("UPLOAD_DIR", "static/uploads")?,
			upload_url_prefix: try_load("UPLOAD_URL_PREFIX", "/static/uploads")?,
			max_upload_bytes: try_load("MAX_UPLOAD_BYTES", "5242880")?,
		})
	}
}

fn var(key: &str) -> Option<String> {
	env::var(key).ok()
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, Error>
where
	T::Err: Display,
{
	var(key)
		.unwrap_or_else(|| {
			info!("{key} not set, using default: {default}");
			default.to_string()
		})
		.parse()
		.map_err(|e: T::Err| Error::Invalid {
			key,
			reason: e.to_string(),
		})
}
