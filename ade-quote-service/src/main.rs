mod config;
mod crm;
mod extractor;
mod messages;
mod pricing;
mod turn;

use std::sync::Arc;

use ade_quote_core::{
    ContextStore, InMemoryContextStore, Offer, PostgresContextStore, QuoteError, QuoteStage,
    SessionContext,
};
use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderValue, Request, StatusCode},
    middleware::{Next, from_fn},
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{Instrument, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::config::ServiceConfig;
use crate::crm::HttpCrmAdapter;
use crate::extractor::RigExtractor;
use crate::pricing::{CredentialCache, HttpPricingAdapter};
use crate::turn::TurnEngine;

#[derive(Clone)]
struct AppState {
    store: Arc<dyn ContextStore>,
    engine: Arc<TurnEngine>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    session_id: Option<String>,
    message: String,
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    session_id: String,
    message: String,
    stage: QuoteStage,
    missing_fields: Vec<String>,
    offers: Vec<Offer>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

/// Initialize structured tracing based on environment variables
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "ade_quote_service=debug,ade_quote_core=debug,tower_http=debug".into()
    });

    match log_format.as_str() {
        "pretty" => {
            // Human-readable logging for development
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        _ => {
            // Structured JSON logging for production
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }
}

/// Middleware to add a correlation ID to all requests
async fn correlation_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> axum::response::Response {
    let correlation_id = Uuid::new_v4().to_string();

    // Make the correlation ID available to downstream handlers
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        request.headers_mut().insert("x-correlation-id", value);
    }

    let span = tracing::info_span!("http_request", correlation_id = %correlation_id);
    next.run(request).instrument(span).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = ServiceConfig::from_env()?;

    // Check for DATABASE_URL and use PostgreSQL if available, otherwise fall
    // back to in-memory contexts
    let store: Arc<dyn ContextStore> = match &config.database_url {
        Some(database_url) => {
            info!("Using PostgreSQL context storage");
            match PostgresContextStore::connect(database_url).await {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    error!(
                        "Failed to connect to PostgreSQL: {}. Falling back to in-memory storage.",
                        e
                    );
                    Arc::new(InMemoryContextStore::new())
                }
            }
        }
        None => {
            info!("Using in-memory context storage (set DATABASE_URL to use PostgreSQL)");
            Arc::new(InMemoryContextStore::new())
        }
    };

    let http = reqwest::Client::new();
    let extractor = Arc::new(RigExtractor::new(config.openrouter_api_key.clone()));
    let crm = Arc::new(HttpCrmAdapter::new(
        http.clone(),
        config.crm_base_url.clone(),
        config.crm_api_key.clone(),
    ));
    let credentials = Arc::new(CredentialCache::new());
    let pricing = Arc::new(HttpPricingAdapter::new(
        http,
        config.pricing_base_url.clone(),
        config.pricing_login.clone(),
        config.pricing_password.clone(),
        credentials,
    ));

    let engine = Arc::new(TurnEngine::new(store.clone(), extractor, crm, pricing));
    let app_state = AppState { store, engine };

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/chat", post(chat))
        .route("/session/{id}", get(get_session))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlation_id_middleware))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server running on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<ErrorResponse>)> {
    let session_id = request
        .session_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    info!(
        session_id = %session_id,
        message_length = %request.message.len(),
        "Processing chat turn"
    );

    match state
        .engine
        .process_message(&session_id, &request.message)
        .await
    {
        Ok(outcome) => Ok(Json(ChatResponse {
            session_id,
            message: outcome.message,
            stage: outcome.stage,
            missing_fields: outcome.missing_fields,
            offers: outcome.offers,
        })),
        Err(e @ (QuoteError::Storage(_) | QuoteError::Database(_))) => {
            error!(
                session_id = %session_id,
                error = %e,
                "Failed to persist the session context"
            );
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    message: messages::SAVE_FAILURE.to_string(),
                }),
            ))
        }
        Err(e) => {
            error!(
                session_id = %session_id,
                error = %e,
                "Chat turn failed"
            );
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    message: messages::GENERIC_FAILURE.to_string(),
                }),
            ))
        }
    }
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionContext>, StatusCode> {
    match state.store.get(&session_id).await {
        Ok(Some(context)) => Ok(Json(context)),
        Ok(None) => {
            info!(session_id = %session_id, "Session not found");
            Err(StatusCode::NOT_FOUND)
        }
        Err(e) => {
            error!(session_id = %session_id, error = %e, "Failed to get session");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
