use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rso_core::{Scope, SharedObjectService};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::ServerConfig,
    session::{scope_for, Session},
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SharedObjectService>,
    pub root: Arc<Scope>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            service: Arc::new(SharedObjectService::new(config.service.clone())),
            root: Scope::root(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/scopes", get(root_status))
        .route("/api/scopes/{*scope}", get(scope_status))
        .route("/ws", get(ws_root))
        .route("/ws/{*scope}", get(ws_scope))
        .with_state(state)
}

pub async fn serve(config: ServerConfig) -> Result<()> {
    let state = AppState::new(&config);
    let app = router(state.clone());

    info!(addr = %config.listen_addr, store = ?config.service.persistence, "rso-server listening");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    state.root.teardown();
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[derive(Serialize)]
struct ObjectSummary {
    name: String,
    version: u32,
    persistent: bool,
    listeners: usize,
    attributes: Vec<String>,
}

#[derive(Serialize)]
struct ScopePayload {
    path: String,
    children: Vec<String>,
    objects: Vec<ObjectSummary>,
}

fn describe(scope: &Scope) -> ScopePayload {
    let mut objects: Vec<ObjectSummary> = scope
        .shared_objects()
        .into_iter()
        .map(|so| ObjectSummary {
            name: so.name().to_string(),
            version: so.version(),
            persistent: so.is_persistent_object(),
            listeners: so.listener_count(),
            attributes: so.attribute_names(),
        })
        .collect();
    objects.sort_by(|a, b| a.name.cmp(&b.name));

    ScopePayload {
        path: scope.path().to_string(),
        children: scope.child_names(),
        objects,
    }
}

async fn root_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(describe(&state.root))
}

/// Describe an existing scope; unknown scopes are not created.
async fn scope_status(
    Path(path): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let mut scope = Arc::clone(&state.root);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        match scope.get_child(segment) {
            Some(child) => scope = child,
            None => {
                return (StatusCode::NOT_FOUND, format!("scope not found: /{path}")).into_response()
            }
        }
    }
    Json(describe(&scope)).into_response()
}

async fn ws_root(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    upgrade(state, String::new(), ws)
}

async fn ws_scope(
    Path(path): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade(state, path, ws)
}

fn upgrade(state: AppState, path: String, ws: WebSocketUpgrade) -> axum::response::Response {
    let scope = match scope_for(&state.root, &path) {
        Ok(scope) => scope,
        Err(err) => {
            warn!(%path, ?err, "rejecting websocket");
            return (StatusCode::BAD_REQUEST, err.to_string()).into_response();
        }
    };

    ws.on_upgrade(move |socket| async move {
        if let Err(err) = handle_ws(socket, scope, state).await {
            warn!(?err, "websocket session ended with error");
        }
    })
}

async fn handle_ws(mut socket: WebSocket, scope: Arc<Scope>, state: AppState) -> Result<()> {
    let (session, mut outbound) = Session::open(Arc::clone(&state.service), scope);
    let listener = session.connection().handle().id();
    info!(scope = %session.scope().path(), %listener, "peer connected");

    let result = async {
        loop {
            tokio::select! {
                // Messages produced by the shared objects for this peer
                queued = outbound.recv() => {
                    let Some(msg) = queued else { break };
                    let text = serde_json::to_string(msg.as_ref())?;
                    if socket.send(WsMessage::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                // Messages from this client
                inbound = socket.recv() => {
                    match inbound {
                        Some(Ok(WsMessage::Text(txt))) => {
                            if let Err(err) = session.handle_frame(txt.as_str()) {
                                warn!(%listener, ?err, "ignoring malformed WS payload");
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Err(err)) => {
                            debug!(%listener, ?err, "websocket receive failed");
                            break;
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    session.close();
    info!(%listener, "peer disconnected");
    result
}
