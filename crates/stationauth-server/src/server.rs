use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, Response},
    routing::get,
};
use stationauth_core::{Clock, SystemClock};
use stationauth_worker::TaskQueue;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{allowlist::AllowlistStore, config::AppConfig, handlers};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub allowlist: Arc<dyn AllowlistStore>,
    pub queue: Arc<dyn TaskQueue>,
    pub clock: Arc<dyn Clock>,
    /// Lifetime given to each accepted request
    pub authorization_timeout: Duration,
}

impl AppState {
    pub fn new(
        cfg: &AppConfig,
        allowlist: Arc<dyn AllowlistStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            allowlist,
            queue,
            clock: Arc::new(SystemClock),
            authorization_timeout: cfg.front_door.authorization_timeout(),
        }
    }
}

pub struct StationAuthServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(cfg: &AppConfig, state: AppState) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/station/{station_id}/driver/{driver_token}/authorize",
            get(handlers::authorize).post(handlers::authorize),
        )
        .route(
            "/station/{station_id}/driver/{driver_token}/acl",
            get(handlers::acl_check)
                .put(handlers::acl_add)
                .delete(handlers::acl_remove),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(|req: &Request<Body>| {
                            tracing::info_span!(
                                "http.request",
                                http.method = %req.method(),
                                http.target = %req.uri(),
                                http.status_code = tracing::field::Empty,
                            )
                        })
                        .on_response(
                            |res: &Response<Body>, latency: Duration, span: &tracing::Span| {
                                span.record(
                                    "http.status_code",
                                    tracing::field::display(res.status().as_u16()),
                                );
                                tracing::info!(
                                    http.status = %res.status().as_u16(),
                                    elapsed_ms = %latency.as_millis(),
                                    "request handled"
                                );
                            },
                        ),
                )
                .layer(CorsLayer::permissive()),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self, state: AppState) -> StationAuthServer {
        let app = build_app(&self.config, state);

        StationAuthServer {
            addr: self.addr,
            app,
        }
    }
}

impl StationAuthServer {
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

pub async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
