use std::{sync::Arc, time::Duration};

use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use crate::{
    config::Config,
    db,
    llm::{self, CompletionClient, CompletionError, OpenAiClient},
    models::{ChatRecord, ChatRequest, ChatResponse, RecordId},
    page,
};

/**
 * \brief Shared, read-only handler state.
 */
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub client: Arc<dyn CompletionClient>,
}

impl AppState {
    pub fn new(config: Config, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            config: Arc::new(config),
            client,
        }
    }
}

/**
 * \brief Start the HTTP service on `0.0.0.0:<port>` with the OpenAI client.
 */
pub async fn run(config: Config) -> Result<()> {
    let conn = db::open_db(&config.db_path)?;
    db::initialize(&conn)?;
    drop(conn);

    let client = OpenAiClient::new(&config)?;
    serve(AppState::new(config, Arc::new(client))).await
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        db = %state.config.db_path.display(),
        model = %state.config.model,
        "server listening"
    );
    axum::serve(listener, router(state)).await?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/chat", post(chat).layer(DefaultBodyLimit::disable()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/**
 * \brief Run one completion and append the exchange to the chat log.
 * \details Completion failures are folded into the stored reply; only storage errors are returned.
 */
pub async fn relay_message(
    config: Arc<Config>,
    client: Arc<dyn CompletionClient>,
    message: Option<String>,
) -> Result<ChatRecord> {
    let outcome =
        complete_bounded(client.as_ref(), message.as_deref(), config.completion_timeout).await;
    if let Err(e) = &outcome {
        tracing::warn!(error = %e, "completion failed");
    }
    let reply = llm::reply_text(&outcome);

    let db_path = config.db_path.clone();
    let user_message = message.clone();
    let ai_response = reply.clone();
    let id = tokio::task::spawn_blocking(move || -> Result<RecordId> {
        let conn = db::open_db(&db_path)?;
        db::append(&conn, user_message.as_deref(), &ai_response)
    })
    .await??;

    tracing::info!(
        record_id = id,
        prompt_len = message.as_deref().map(str::len).unwrap_or(0),
        ok = outcome.is_ok(),
        "chat exchange stored"
    );
    Ok(ChatRecord {
        id,
        user_message: message,
        ai_response: reply,
    })
}

async fn complete_bounded(
    client: &dyn CompletionClient,
    message: Option<&str>,
    timeout: Duration,
) -> Result<String, CompletionError> {
    match tokio::time::timeout(timeout, client.complete(message)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(CompletionError::Timeout),
    }
}

async fn index() -> Html<&'static str> {
    Html(page::INDEX_HTML)
}

/**
 * \brief Liveness probe; touches neither the store nor the model.
 */
async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "OK",
    )
}

/**
 * \brief `POST /chat`: upstream failures still answer 200 with an `Error: ...` reply.
 */
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    // Detached so the exchange is still stored if the caller disconnects.
    let relay = tokio::spawn(relay_message(state.config, state.client, req.message));
    let record = relay
        .await
        .map_err(internal_err)?
        .map_err(internal_err)?;
    Ok(Json(ChatResponse {
        reply: record.ai_response,
    }))
}

fn internal_err<E: std::fmt::Display>(e: E) -> (StatusCode, String) {
    tracing::error!(error = %e, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}
