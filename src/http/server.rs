//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router whose only handler is the event pool
//! - Wire up middleware (timeout, tracing)
//! - Serve on a listener until the shutdown broadcast fires

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GateConfig;
use crate::events::EventPool;

/// HTTP front end dispatching every request through an `EventPool`.
pub struct GatewayServer {
    router: Router,
    events: Arc<EventPool>,
}

impl GatewayServer {
    pub fn new(config: &GateConfig, events: Arc<EventPool>) -> Self {
        let router = Self::build_router(config, events.clone());
        Self { router, events }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GateConfig, events: Arc<EventPool>) -> Router {
        Router::new()
            .fallback(dispatch_handler)
            .with_state(events)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until a value (or close) arrives on `shutdown`.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            base_host = %self.events.host(),
            events = self.events.len(),
            "Gateway starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Gateway draining connections");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn dispatch_handler(State(events): State<Arc<EventPool>>, request: Request<Body>) -> Response {
    events.dispatch(request).await
}
