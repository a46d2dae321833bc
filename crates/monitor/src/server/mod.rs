mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{scheduler::Poller, Result};

pub use routes::FilterQuery;

pub struct Server {
    poller: Arc<Poller>,
}

impl Server {
    pub fn new(poller: Arc<Poller>) -> Self {
        Self { poller }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self);

        Router::new()
            .route("/health", get(routes::health_check))
            .route("/metrics", get(routes::metrics))
            .route("/alerts", get(routes::list_alerts))
            .route("/problems", get(routes::list_problems))
            .route("/stats", get(routes::stats))
            .route("/snapshot", get(routes::snapshot))
            .route("/refresh", post(routes::refresh))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
