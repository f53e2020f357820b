#![warn(clippy::pedantic)]

mod assistant;
mod config;
mod error;
mod extract;
mod route;
mod session;
mod store;
mod upload;

use std::sync::Arc;

use argon2::Argon2;
use axum::{extract::DefaultBodyLimit, Router};
use tower::{Layer, ServiceBuilder};
use tower_http::{
	compression::CompressionLayer,
	cors::CorsLayer,
	normalize_path::NormalizePathLayer,
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	services::ServeDir,
	trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
	assistant::{Assistant, OpenAiAssistant},
	config::{Config, StoreConfig},
	store::{MemoryStore, PgStore, Store},
	upload::Uploads,
};

pub type Database = Arc<dyn Store>;
pub type AppState = State;

/// Room left in the body limit for the text fields of a multipart form.
const FORM_OVERHEAD: usize = 64 * 1024;

/// The shared application state.
///
/// This should contain all shared dependencies that handlers need to access,
/// such as the store, the password hasher or the assistant client.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub database: Database,
	pub hasher: Argon2<'static>,
	/// `None` when no API key is configured. Chat requests then fail, and the
	/// health check reports the assistant as unavailable.
	pub assistant: Option<Arc<dyn Assistant>>,
	pub uploads: Uploads,
}

/// Builds the application router with every route and middleware layer.
pub fn app(state: State, upload_url_prefix: &str) -> Router {
	let request_id = axum::http::HeaderName::from_static("x-request-id");
	let body_limit = state.uploads.max_bytes() + FORM_OVERHEAD;
	let static_files = ServeDir::new(state.uploads.dir());

	Router::new()
		.nest("/auth", route::auth::routes())
		.nest("/users", route::user::routes())
		.nest(
			"/posts",
			route::post::routes().merge(route::review::post_routes()),
		)
		.nest("/reviews", route::review::routes())
		.nest("/chat", route::chat::routes())
		.nest_service(upload_url_prefix, static_files)
		.layer(DefaultBodyLimit::max(body_limit))
		.layer(
			ServiceBuilder::new()
				.layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
				.layer(TraceLayer::new_for_http())
				.layer(PropagateRequestIdLayer::new(request_id))
				.layer(CompressionLayer::new()),
		)
		.layer(CorsLayer::permissive())
		.with_state(state)
}

async fn connect(config: &StoreConfig) -> Result<Database, store::Error> {
	Ok(match config {
		StoreConfig::Postgres(url) => Arc::new(PgStore::connect(url).await?),
		StoreConfig::Memory => {
			tracing::warn!("using the in-memory store, data is lost on restart");
			Arc::new(MemoryStore::new())
		}
	})
}

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();

	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()))
		.with(tracing_subscriber::fmt::layer())
		.init();

	let config = Config::load().expect("invalid configuration");

	let assistant = config.assistant.as_ref().map(|assistant| {
		Arc::new(OpenAiAssistant::new(assistant).expect("failed to build the assistant client"))
			as Arc<dyn Assistant>
	});

	let state = State {
		database: connect(&config.store)
			.await
			.expect("failed to connect to the store"),
		hasher: Argon2::default(),
		assistant,
		uploads: Uploads::from_config(&config),
	};

	tokio::fs::create_dir_all(state.uploads.dir())
		.await
		.expect("failed to create the upload directory");

	let app = NormalizePathLayer::trim_trailing_slash().layer(app(state, &config.upload_url_prefix));

	let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
		.await
		.expect("failed to bind to port");

	tracing::info!(host = %config.host, port = config.port, "listening");

	axum::serve(listener, axum::ServiceExt::<axum::extract::Request>::into_make_service(app))
		.await
		.expect("server error");
}
