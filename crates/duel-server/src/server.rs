use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use duel_core::SessionRegistry;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::client::{self, ClientRegistry, Inbound};
use crate::gateway::Gateway;
use crate::router::{Limits, Router};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origin. Any origin is allowed when unset.
    pub frontend_url: Option<String>,
    pub max_send_queue: usize,
    pub inbound_queue: usize,
    pub heartbeat_interval: Duration,
    pub client_timeout: Duration,
    pub cleanup_interval: Duration,
    pub limits: Limits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3001,
            frontend_url: None,
            max_send_queue: 256,
            inbound_queue: 1024,
            heartbeat_interval: Duration::from_secs(30),
            client_timeout: Duration::from_secs(90),
            cleanup_interval: Duration::from_secs(60),
            limits: Limits::default(),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<Router>,
    pub clients: Arc<ClientRegistry>,
    pub inbound_tx: mpsc::Sender<Inbound>,
    pub heartbeat: Duration,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState, frontend_url: Option<&str>) -> axum::Router {
    axum::Router::new()
        .route("/ws", get(ws_handler))
        .route("/api/url", get(url_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(cors_layer(frontend_url))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(frontend_url: Option<&str>) -> CorsLayer {
    let Some(origin) = frontend_url else {
        return CorsLayer::permissive();
    };
    match origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST]),
        Err(e) => {
            tracing::warn!(frontend_url = origin, error = %e, "Invalid frontend URL, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Create and start the server. Returns a handle to shut it down.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let clients = Arc::new(ClientRegistry::new(config.max_send_queue, config.client_timeout));
    let sessions = Arc::new(SessionRegistry::new());
    let router = Arc::new(Router::new(
        sessions,
        Arc::clone(&clients) as Arc<dyn Gateway>,
        config.limits.clone(),
    ));

    let cleanup = client::start_cleanup_task(Arc::clone(&clients), config.cleanup_interval);

    // Every inbound event funnels through one processor, so each is
    // handled to completion before the next.
    let (inbound_tx, inbound_rx) = mpsc::channel::<Inbound>(config.inbound_queue);
    let processor = tokio::spawn(process_inbound(inbound_rx, Arc::clone(&router)));

    let state = AppState {
        router,
        clients,
        inbound_tx,
        heartbeat: config.heartbeat_interval,
    };

    let app = build_router(state, config.frontend_url.as_deref());
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, "Duel server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        shutdown: Some(shutdown_tx),
        server,
        processor,
        cleanup,
    })
}

/// Handle returned by `start()`, keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<()>,
    processor: tokio::task::JoinHandle<()>,
    cleanup: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for the listener to close.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.server).await;
        self.processor.abort();
        self.cleanup.abort();
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a new WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (conn_id, rx) = state.clients.register();
    tracing::info!(conn_id = %conn_id, "WebSocket client connected");

    client::handle_ws_connection(
        socket,
        conn_id,
        rx,
        state.clients,
        state.inbound_tx,
        state.heartbeat,
    )
    .await;
}

/// Externally reachable base address, derived from the request.
async fn url_handler(headers: HeaderMap) -> impl IntoResponse {
    Json(serde_json::json!({ "url": base_url(&headers) }))
}

fn base_url(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

/// Health check HTTP endpoint.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "rooms": state.router.sessions().len(),
        "connections": state.clients.count(),
    }))
}

/// Process inbound frames and disconnects one at a time.
async fn process_inbound(mut rx: mpsc::Receiver<Inbound>, router: Arc<Router>) {
    while let Some(inbound) = rx.recv().await {
        match inbound {
            Inbound::Frame(conn_id, raw) => router.handle_frame(&conn_id, &raw),
            Inbound::Disconnected(conn_id) => router.handle_disconnect(&conn_id),
        }
    }
    tracing::info!("Inbound channel closed");
}
