//! DataBridge HTTP server
//!
//! All operations live under `/api`; `/health` and `/info` report liveness.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    routing::{get, post},
    Json, Router,
};
use http::{HeaderValue, Method};
use serde_json::json;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use databridge_backends::{Bridge, Connector};
use databridge_common::{BridgeConfig, ServerConfig};

use crate::api::{self, AppState};

pub struct BridgeServer {
    config: BridgeConfig,
    bridge: Bridge,
    start_time: Instant,
}

impl BridgeServer {
    /// Create a server talking to the real backends
    pub fn new(config: BridgeConfig) -> Self {
        let bridge = Bridge::new(config.backend.clone());
        Self {
            config,
            bridge,
            start_time: Instant::now(),
        }
    }

    /// Create a server whose backend handles come from `connector`
    pub fn with_connector(config: BridgeConfig, connector: Arc<dyn Connector>) -> Self {
        let bridge = Bridge::with_connector(config.backend.clone(), connector);
        Self {
            config,
            bridge,
            start_time: Instant::now(),
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState {
            bridge: self.bridge.clone(),
        });
        let start_time = self.start_time;

        let api_router = Router::new()
            .route("/connect", post(api::connect))
            .route("/tables/:table/columns", post(api::table_columns))
            .route("/tables/:table/data", post(api::table_data))
            .route("/execute-sql", post(api::execute_sql))
            .route("/save-joined-table", post(api::save_joined_table))
            .route("/export-joined-table", post(api::export_joined_table))
            .route("/preview", post(api::preview))
            .route("/transform", post(api::transform))
            .with_state(state);

        let mut router = Router::new()
            .route(
                "/health",
                get(|| async {
                    Json(json!({
                        "status": "healthy",
                        "timestamp": chrono::Utc::now().to_rfc3339()
                    }))
                }),
            )
            .route(
                "/info",
                get(move || {
                    let uptime = start_time.elapsed().as_secs();
                    async move {
                        Json(json!({
                            "name": "DataBridge",
                            "version": env!("CARGO_PKG_VERSION"),
                            "uptime_seconds": uptime,
                            "backends": ["relational", "keyvalue"],
                            "paths": {
                                "api": "/api/*",
                                "health": "/health"
                            }
                        }))
                    }
                }),
            )
            .nest("/api", api_router);

        if self.config.server.enable_cors {
            router = router.layer(cors_layer(&self.config.server));
        }
        if self.config.server.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Run the server until Ctrl+C or SIGTERM
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.config.server.bind_address, self.config.server.port
        )
        .parse()?;

        info!("DataBridge server starting on {}", addr);
        info!("  /api/*  - Bridge API");
        info!("  /health - Health check");
        info!(
            page_limit = self.config.backend.page_limit,
            timeout_secs = self.config.backend.timeout_secs,
            "Backend options"
        );

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("DataBridge server stopped");
        Ok(())
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if server.allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = server
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        _ = terminate => info!("Received terminate signal, shutting down..."),
    }
}
