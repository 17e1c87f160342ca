//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::Router;
use session_gate::events::{BoxError, Event, EventConfig, Tag};
use session_gate::lifecycle::Shutdown;
use session_gate::{EventPool, GateConfig, GatewayServer};
use tokio::net::TcpListener;

/// Event that answers every request with a fixed body.
pub struct FixedEvent {
    config: EventConfig,
    body: &'static str,
    pub closes: AtomicUsize,
}

impl FixedEvent {
    pub fn new(tag: &str, body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            config: EventConfig::new(Tag::new(tag).unwrap(), format!("{} event", tag)),
            body,
            closes: AtomicUsize::new(0),
        })
    }
}

impl Event for FixedEvent {
    fn config(&self) -> &EventConfig {
        &self.config
    }

    fn handler(&self) -> Router {
        let body = self.body;
        Router::new().fallback(move || async move { body })
    }

    fn close(&self) -> Result<(), BoxError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Serve `events` on an ephemeral port. Returns the bound address.
pub async fn start_gateway(events: Arc<EventPool>, shutdown: &Shutdown) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = GatewayServer::new(&GateConfig::default(), events);
    let rx = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    addr
}
