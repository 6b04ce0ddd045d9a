//! HTTP surface of the mdcache daemon.
//!
//! [`router`] wires the render pipeline, the post index and the GitHub
//! webhook into an axum [`Router`]. The binary in `main.rs` only parses
//! arguments and runs the server.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceExt;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, Instrument};

use mdcache_core::webhook::{SIGNATURE_SHA1_HEADER, SIGNATURE_SHA256_HEADER};
use mdcache_core::{request_span, DeployTrigger, Error, RenderPipeline, RestartSignal, WebhookGate};

/// Largest webhook body accepted, in bytes.
pub const WEBHOOK_BODY_LIMIT: usize = 100 * 1024;

pub const WEBHOOK_ROUTE: &str = "/webhooks/github";

/// Signature check and deploy handling for the webhook route.
#[derive(Clone)]
pub struct WebhookState {
    pub gate: WebhookGate,
    pub trigger: Arc<DeployTrigger>,
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RenderPipeline>,
    pub webhook: Option<WebhookState>,
    pub restart: RestartSignal,
}

impl AppState {
    pub fn new(pipeline: RenderPipeline, restart: RestartSignal) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            webhook: None,
            restart,
        }
    }

    pub fn with_webhook(mut self, gate: WebhookGate, trigger: DeployTrigger) -> Self {
        self.webhook = Some(WebhookState {
            gate,
            trigger: Arc::new(trigger),
        });
        self
    }
}

/// Build the full router. The webhook route exists only when a secret is set.
pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(index_page))
        .route("/healthz", get(healthz))
        .route("/posts", get(post_index))
        .route("/*path", get(content_page));

    if state.webhook.is_some() {
        app = app.route(
            WEBHOOK_ROUTE,
            post(github_webhook).layer(DefaultBodyLimit::max(WEBHOOK_BODY_LIMIT)),
        );
    }

    app.with_state(state).layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "OK"
}

async fn index_page(State(state): State<AppState>, request: Request) -> Response {
    serve_content(state, "/".to_string(), request).await
}

async fn content_page(
    State(state): State<AppState>,
    Path(path): Path<String>,
    request: Request,
) -> Response {
    serve_content(state, format!("/{path}"), request).await
}

/// Rendered page for `request_path`, else a static file under the content root.
async fn serve_content(state: AppState, request_path: String, request: Request) -> Response {
    let span = request_span(&request_path);
    async move {
        match state.pipeline.resolve(&request_path).await {
            Ok(artifact) => send_html(&artifact).await,
            Err(Error::NotFound(_)) => serve_static(&state, request).await,
            Err(e) => error_response(e),
        }
    }
    .instrument(span)
    .await
}

async fn serve_static(state: &AppState, request: Request) -> Response {
    let files =
        ServeDir::new(state.pipeline.config().content_root()).append_index_html_on_directories(false);
    match files.oneshot(request).await {
        Ok(response) => {
            if response.status() == StatusCode::NOT_FOUND {
                debug!("no document or static file");
                return not_found();
            }
            response.map(Body::new)
        }
        Err(never) => match never {},
    }
}

async fn post_index(State(state): State<AppState>) -> Response {
    let span = request_span("/posts");
    async move {
        match state.pipeline.build_index().await {
            Ok(artifact) => send_html(&artifact).await,
            Err(e) => error_response(e),
        }
    }
    .instrument(span)
    .await
}

async fn send_html(artifact: &std::path::Path) -> Response {
    match tokio::fs::read_to_string(artifact).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => error_response(Error::from_io(artifact, e)),
    }
}

async fn github_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(webhook) = &state.webhook else {
        return not_found();
    };

    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let payload = match webhook.gate.verify(
        &body,
        header(SIGNATURE_SHA1_HEADER),
        header(SIGNATURE_SHA256_HEADER),
    ) {
        Ok(payload) => payload,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    match webhook.trigger.handle(&payload).await {
        Ok(outcome) => {
            if outcome.restart_required() {
                // Graceful shutdown lets this response finish first.
                state.restart.request();
            }
            (StatusCode::OK, outcome.message()).into_response()
        }
        Err(e @ Error::Payload(_)) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(Error::DeployFailure(message)) => {
            error!(error = %message, "deploy failed");
            (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
        }
        Err(e) => error_response(e),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

fn error_response(err: Error) -> Response {
    if err.is_not_found() {
        debug!(error = %err, "not found");
        return not_found();
    }
    error!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}
