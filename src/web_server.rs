use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        DefaultBodyLimit, Path, State,
    },
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    path::{Path as FsPath, PathBuf},
    sync::Arc,
    time::Duration,
};
use tokio::sync::{broadcast, Mutex};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::app_state::{Session, SessionSnapshot};
use crate::constants::{MAX_SCAN_BODY_BYTES, NOTIFICATION_TTL};
use crate::error::UserActionError;
use crate::image::{decode_data_url, sniff_mime};
use crate::model_client::ModelClient;
use crate::rewards::{self, RewardItem};

// Messages pushed to every connected WebSocket client
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub message_type: String,
    pub payload: serde_json::Value,
}

/// Shared state behind every handler. The session lock is never held across a
/// model call.
#[derive(Clone)]
pub struct ServerState {
    templates: Arc<AutoReloader>,
    session: Arc<Mutex<Session>>,
    client: ModelClient,
    broadcast_tx: broadcast::Sender<BroadcastMessage>,
    notification_ttl: Duration,
}

impl ServerState {
    pub fn new(client: ModelClient, template_dir: impl Into<PathBuf>) -> Self {
        let (broadcast_tx, _) = broadcast::channel::<BroadcastMessage>(100);
        Self {
            templates: Arc::new(create_minijinja_env(template_dir.into())),
            session: Arc::new(Mutex::new(Session::new())),
            client,
            broadcast_tx,
            notification_ttl: NOTIFICATION_TTL,
        }
    }

    pub fn with_notification_ttl(mut self, ttl: Duration) -> Self {
        self.notification_ttl = ttl;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.broadcast_tx.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.session.lock().await.snapshot()
    }

    fn broadcast(&self, snapshot: &SessionSnapshot) {
        let payload = match serde_json::to_value(snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to serialize session snapshot: {}", e);
                return;
            }
        };
        let message = BroadcastMessage {
            message_type: "State".to_string(),
            payload,
        };
        if self.broadcast_tx.send(message).is_err() {
            debug!("No WebSocket clients listening for state update");
        }
    }

    // Toasts disappear on their own after the TTL unless a newer one replaced them.
    fn schedule_notification_expiry(&self, id: u64) {
        let state = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(state.notification_ttl).await;
            let snapshot = {
                let mut session = state.session.lock().await;
                if !session.expire_notification(id) {
                    return;
                }
                session.snapshot()
            };
            state.broadcast(&snapshot);
        });
    }
}

// Minijinja Environment setup
fn create_minijinja_env(template_dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(template_dir.clone()));
        notifier.watch_path(&template_dir, true);
        Ok(env)
    })
}

/// Error body returned by the JSON API. Carries the session when the failure
/// changed what the UI should show.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    state: Option<SessionSnapshot>,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            state: None,
        }
    }

    fn with_state(mut self, state: SessionSnapshot) -> Self {
        self.state = Some(state);
        self
    }
}

impl From<UserActionError> for ApiError {
    fn from(err: UserActionError) -> Self {
        let status = match err {
            UserActionError::InsufficientPoints { .. } | UserActionError::RewardUnavailable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            UserActionError::ScanInProgress | UserActionError::NotScanning | UserActionError::ChatPending => {
                StatusCode::CONFLICT
            }
            UserActionError::EmptyMessage => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.message,
            "state": self.state,
        }));
        (self.status, body).into_response()
    }
}

async fn index_handler(State(state): State<ServerState>) -> Result<Html<String>, (StatusCode, Html<String>)> {
    let snapshot = state.snapshot().await;
    // Acquire env, get template, and render within the same block
    state
        .templates
        .acquire_env()
        .and_then(|env| {
            env.get_template("index.html").and_then(|tmpl| {
                tmpl.render(minijinja::context! {
                    title => "Eco Untung",
                    rewards => rewards::catalog(),
                    state => snapshot,
                })
            })
        })
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
        })
}

async fn state_handler(State(state): State<ServerState>) -> Json<SessionSnapshot> {
    Json(state.snapshot().await)
}

async fn rewards_handler() -> Json<&'static [RewardItem]> {
    Json(rewards::catalog())
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    /// Data URL or bare base64.
    pub image: String,
}

async fn scan_handler(
    State(state): State<ServerState>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let bytes =
        decode_data_url(&request.image).map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    let pending = {
        let mut session = state.session.lock().await;
        session.start_scan(request.image)?;
        session.snapshot()
    };
    state.broadcast(&pending);

    // Settle the scan on its own task so a dropped request can't leave the session in Scanning.
    let task_state = state.clone();
    let settled = tokio::spawn(async move {
        let outcome = task_state.client.classify(&bytes).await;
        let failure = outcome.as_ref().err().map(|e| e.to_string());

        let snapshot = {
            let mut session = task_state.session.lock().await;
            session.finish_scan(outcome)?;
            session.snapshot()
        };
        task_state.broadcast(&snapshot);
        Ok::<_, UserActionError>((snapshot, failure))
    });
    let (snapshot, failure) = settled.await.map_err(join_failure)??;

    match failure {
        Some(message) => {
            warn!(%message, "Classification failed");
            Err(ApiError::new(StatusCode::BAD_GATEWAY, message).with_state(snapshot))
        }
        None => Ok(Json(snapshot)),
    }
}

fn join_failure(e: tokio::task::JoinError) -> ApiError {
    error!("Model task failed: {:?}", e);
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "model task failed")
}

async fn scan_image_handler(State(state): State<ServerState>) -> Result<Response, ApiError> {
    let image = state
        .session
        .lock()
        .await
        .scan_image()
        .map(str::to_owned)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "no photo in the current scan"))?;
    let bytes = decode_data_url(&image).map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, sniff_mime(&bytes))], bytes).into_response())
}

async fn claim_handler(State(state): State<ServerState>) -> Json<SessionSnapshot> {
    let (snapshot, notification) = {
        let mut session = state.session.lock().await;
        let claimed = session.claim_points();
        let notification = claimed.and_then(|_| session.notification().map(|n| n.id));
        (session.snapshot(), notification)
    };
    if let Some(id) = notification {
        state.schedule_notification_expiry(id);
        state.broadcast(&snapshot);
    }
    Json(snapshot)
}

async fn redeem_handler(
    State(state): State<ServerState>,
    Path(id): Path<u32>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let item = rewards::find(id)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("reward {} not found", id)))?;

    let mut session = state.session.lock().await;
    match session.redeem(item) {
        Ok(_) => {
            let snapshot = session.snapshot();
            drop(session);
            if let Some(notification) = &snapshot.notification {
                state.schedule_notification_expiry(notification.id);
            }
            state.broadcast(&snapshot);
            Ok(Json(snapshot))
        }
        Err(e) => {
            let snapshot = session.snapshot();
            drop(session);
            state.broadcast(&snapshot);
            Err(ApiError::from(e).with_state(snapshot))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub state: SessionSnapshot,
}

async fn chat_handler(
    State(state): State<ServerState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let (prior, pending) = {
        let mut session = state.session.lock().await;
        let prior = session.begin_chat(&request.message)?;
        (prior, session.snapshot())
    };
    state.broadcast(&pending);

    // Same as scans: the reply lands in the session even if the client went away.
    let task_state = state.clone();
    let settled = tokio::spawn(async move {
        let reply = task_state.client.converse(request.message.trim(), &prior).await;

        let snapshot = {
            let mut session = task_state.session.lock().await;
            session.finish_chat(reply.clone());
            session.snapshot()
        };
        task_state.broadcast(&snapshot);
        (reply, snapshot)
    });
    let (reply, snapshot) = settled.await.map_err(join_failure)?;

    Ok(Json(ChatResponse { reply, state: snapshot }))
}

async fn dismiss_error_handler(State(state): State<ServerState>) -> Json<SessionSnapshot> {
    let snapshot = {
        let mut session = state.session.lock().await;
        session.dismiss_error();
        session.snapshot()
    };
    state.broadcast(&snapshot);
    Json(snapshot)
}

// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn state_message(snapshot: &SessionSnapshot) -> Option<String> {
    let message = BroadcastMessage {
        message_type: "State".to_string(),
        payload: serde_json::to_value(snapshot).ok()?,
    };
    serde_json::to_string(&message).ok()
}

// Handle individual WebSocket connections
async fn handle_socket(socket: WebSocket, state: ServerState) {
    info!("New WebSocket connection established");
    let mut broadcast_rx = state.subscribe();
    let (mut sender, mut receiver) = socket.split();

    // Start every client off with the current screen
    if let Some(json_msg) = state_message(&state.snapshot().await) {
        if sender.send(Message::Text(json_msg)).await.is_err() {
            warn!("Failed to send initial state to new WebSocket client");
            return;
        }
    }

    loop {
        tokio::select! {
            received = broadcast_rx.recv() => {
                let json_msg = match received {
                    Ok(msg) => serde_json::to_string(&msg).ok(),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Dropped updates don't matter, only the latest state does
                        debug!(skipped, "WebSocket client lagged, resending current state");
                        state_message(&state.snapshot().await)
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Some(json_msg) = json_msg else {
                    error!("Failed to serialize broadcast message");
                    continue;
                };
                if sender.send(Message::Text(json_msg)).await.is_err() {
                    warn!("WebSocket client disconnected or send error. Closing connection.");
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        info!("WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => {
                        debug!("Ignoring text message from client: {}", text);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!("WebSocket receive error: {}", e);
                        break;
                    }
                }
            }
        }
    }
    info!("WebSocket connection closed");
}

/// All routes, with static assets served from `static_dir`.
pub fn router(state: ServerState, static_dir: &FsPath) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .route("/api/state", get(state_handler))
        .route("/api/rewards", get(rewards_handler))
        .route("/api/rewards/:id/redeem", post(redeem_handler))
        .route(
            "/api/scan",
            post(scan_handler).layer(DefaultBodyLimit::max(MAX_SCAN_BODY_BYTES)),
        )
        .route("/api/scan/image", get(scan_image_handler))
        .route("/api/scan/claim", post(claim_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/error/dismiss", post(dismiss_error_handler))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn start_web_server(port: u16, state: ServerState, static_dir: PathBuf) -> Result<()> {
    let app = router(state, &static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
