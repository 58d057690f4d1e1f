use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    middleware,
    routing::get,
};
use tokio::task::JoinHandle;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use storefront_cache::{CacheBackend, RefreshListener, create_cache_backend};
use storefront_db_postgres::{DynPostgresRecordStore, create_record_store};
use storefront_storage::DynRecordStore;

use crate::config::{ApiConfig, AppConfig};
use crate::gate::{self, AccessGate};
use crate::resolver::Resolver;
use crate::{handlers, middleware as app_middleware};

const LOCAL_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared per-process state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
    pub records: DynRecordStore,
    pub cache: CacheBackend,
    pub gate: Arc<AccessGate>,
    pub api: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(cfg: &AppConfig, cache: CacheBackend, records: DynRecordStore) -> Self {
        let resolver = Resolver::new(Arc::new(cache.clone()), records.clone(), cfg.cache_ttl());
        Self {
            resolver: Arc::new(resolver),
            records,
            cache,
            gate: Arc::new(AccessGate::new(cfg.auth.access_token_secret.clone())),
            api: Arc::new(cfg.api.clone()),
        }
    }
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    // Only the product route sits behind the gate
    let products = Router::new()
        .route("/", get(handlers::get_product))
        .route_layer(middleware::from_fn_with_state(
            state.gate.clone(),
            gate::access_gate,
        ));

    Router::new()
        .merge(products)
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .with_state(state)
        // Later layers wrap earlier ones; request id runs before the trace span opens
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record("http.status_code", tracing::field::display(res.status().as_u16()));
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
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

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Connects the record store and the cache, then assembles the router.
    ///
    /// In Redis mode a refresh listener is started that re-warms entries
    /// named on the refresh channel. In local mode a background task purges
    /// expired entries.
    pub async fn build(self) -> anyhow::Result<StorefrontServer> {
        let store = create_record_store(&self.config.storage.postgres).await?;
        tracing::info!(
            database = %self.config.storage.postgres.database,
            pool_size = self.config.storage.postgres.pool_size,
            "record store connected"
        );

        let cache = create_cache_backend(&self.config.redis).await;
        let state = AppState::new(&self.config, cache.clone(), store.clone());

        let background = if cache.redis_pool().is_some() {
            RefreshListener {
                redis_url: self.config.redis.url.clone(),
                handler: state.resolver.clone(),
            }
            .start()
        } else {
            spawn_local_purge(cache.clone())
        };

        let app = build_app(state, &self.config);

        Ok(StorefrontServer {
            addr: self.addr,
            app,
            store,
            background,
        })
    }
}

fn spawn_local_purge(cache: CacheBackend) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(LOCAL_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, "purged expired cache entries");
            }
        }
    })
}

pub struct StorefrontServer {
    addr: SocketAddr,
    app: Router,
    store: DynPostgresRecordStore,
    background: JoinHandle<()>,
}

impl StorefrontServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.background.abort();
        self.store.close().await;
        tracing::info!("record store pool closed");
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
