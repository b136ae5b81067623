use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
};

use folio_core::{DocumentStore, FolioConfig, Resolver, SearchIndex};

mod assets;
mod dto;
mod error;
mod handlers;
mod page;
mod security;

#[cfg(test)]
mod tests;

#[derive(Clone)]
pub(crate) struct WebState {
    pub(crate) resolver: Resolver,
    pub(crate) config: Arc<FolioConfig>,
}

impl WebState {
    /// Open the document root and wire the index into a resolver. The index
    /// starts empty; callers decide when to build it.
    pub(crate) fn open(config: FolioConfig) -> Result<Self> {
        config.validate().context("invalid configuration")?;
        let store = DocumentStore::open(&config.root)
            .with_context(|| format!("failed to open document root {}", config.root.display()))?;
        let index = SearchIndex::new(store, &config).context("failed to create search index")?;
        Ok(Self {
            resolver: Resolver::new(index, &config),
            config: Arc::new(config),
        })
    }
}

/// Start the document server and block until shutdown.
///
/// The search index is built in the background; requests are served while it
/// fills, and search pages say so until the build completes.
///
/// # Errors
/// Returns an error when the configuration or root is invalid, the runtime
/// cannot be created, the socket cannot be bound, or the server fails.
pub fn serve_web(config: FolioConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = WebState::open(config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build web runtime")?;

    runtime.block_on(async move {
        let index = state.resolver.index().clone();
        tokio::spawn(async move {
            match index.build().await {
                Ok(report) => tracing::info!(
                    indexed = report.indexed,
                    skipped = report.skipped,
                    failed = report.failed,
                    "search index ready"
                ),
                Err(err) => tracing::error!(error = %err, "search index build failed"),
            }
        });

        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("failed to bind web server at {bind_addr}"))?;
        tracing::info!(
            root = %state.resolver.store().root().display(),
            "folio listening on http://{}",
            listener.local_addr()?
        );

        axum::serve(listener, app_router(state))
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutdown requested");
            })
            .await
            .context("web server failed")
    })
}

pub(crate) fn app_router(state: WebState) -> Router {
    let body_limit = usize::try_from(state.config.upload_limit_bytes).unwrap_or(usize::MAX);
    Router::new()
        .route("/", get(handlers::resolve_root).post(handlers::save_root))
        .route("/_upload", post(handlers::upload))
        .route("/_assets/folio.css", get(handlers::stylesheet))
        .route(
            "/{*route}",
            get(handlers::resolve_route).post(handlers::save_route),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(security::security_headers_middleware))
        .with_state(state)
}
