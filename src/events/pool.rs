//! Event pool: registry of running events and subdomain dispatch.
//!
//! # Responsibilities
//! - Register, replace and remove events by tag
//! - Cache each event's handler for the request path
//! - Resolve `<tag>.<base host>` to a handler, 404 otherwise
//! - Close every event on shutdown
//!
//! # Design Decisions
//! - One RwLock over two maps with identical key sets; dispatch only
//!   takes the read side and clones the handler out before running it
//! - Handlers are built outside the lock
//! - Exact base-host match: `a.b.example.com` is not routed for
//!   `example.com`

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use thiserror::Error;
use tower::ServiceExt;

use crate::events::event::{BoxError, Event};
use crate::events::tag::Tag;
use crate::http::response;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("unknown event {0}")]
    UnknownEvent(Tag),

    #[error("failed to close event {tag}: {source}")]
    Close {
        tag: Tag,
        #[source]
        source: BoxError,
    },
}

/// Why a request could not be routed to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Miss {
    MissingHost,
    SingleLabel,
    ForeignHost,
    InvalidTag,
    UnknownEvent,
}

impl Miss {
    pub fn as_str(&self) -> &'static str {
        match self {
            Miss::MissingHost => "missing_host",
            Miss::SingleLabel => "single_label",
            Miss::ForeignHost => "foreign_host",
            Miss::InvalidTag => "invalid_tag",
            Miss::UnknownEvent => "unknown_event",
        }
    }
}

#[derive(Default)]
struct Registry {
    events: HashMap<Tag, Arc<dyn Event>>,
    handlers: HashMap<Tag, Router>,
}

/// Running events, addressed by subdomain of `host`.
pub struct EventPool {
    host: String,
    not_found: Router,
    registry: RwLock<Registry>,
}

impl EventPool {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('.').to_ascii_lowercase(),
            not_found: Router::new().fallback(response::not_found),
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Replace the handler used for unroutable requests.
    pub fn with_not_found(mut self, handler: Router) -> Self {
        self.not_found = handler;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Register `event` under its own tag. An existing entry is replaced.
    pub fn add_event(&self, event: Arc<dyn Event>) {
        let tag = event.config().tag.clone();
        let name = event.config().name.clone();
        let handler = event.handler();

        let (replaced, count) = {
            let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
            let replaced = registry.events.insert(tag.clone(), event).is_some();
            registry.handlers.insert(tag.clone(), handler);
            (replaced, registry.events.len())
        };

        tracing::info!(tag = %tag, name = %name, replaced, "Event registered");
        metrics::set_events_active(count);
    }

    /// Unregister the event with `tag` and return it.
    pub fn remove_event(&self, tag: &Tag) -> Result<Arc<dyn Event>, PoolError> {
        let (event, count) = {
            let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
            let event = registry
                .events
                .remove(tag)
                .ok_or_else(|| PoolError::UnknownEvent(tag.clone()))?;
            registry.handlers.remove(tag);
            (event, registry.events.len())
        };

        tracing::info!(tag = %tag, "Event removed");
        metrics::set_events_active(count);
        Ok(event)
    }

    pub fn get_event(&self, tag: &Tag) -> Result<Arc<dyn Event>, PoolError> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .get(tag)
            .cloned()
            .ok_or_else(|| PoolError::UnknownEvent(tag.clone()))
    }

    /// Snapshot of all registered events.
    pub fn get_all_events(&self) -> Vec<Arc<dyn Event>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .values()
            .cloned()
            .collect()
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .contains_key(tag)
    }

    pub fn len(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every registered event. Returns the first error but attempts all.
    pub fn close(&self) -> Result<(), PoolError> {
        let events = self.get_all_events();
        tracing::info!(count = events.len(), "Closing events");

        let mut first_err = None;
        for event in events {
            let tag = event.config().tag.clone();
            if let Err(source) = event.close() {
                tracing::error!(tag = %tag, error = %source, "Failed to close event");
                first_err.get_or_insert(PoolError::Close { tag, source });
            }
        }

        first_err.map_or(Ok(()), Err)
    }

    /// Extract the event tag from a host name (port allowed).
    pub fn resolve_tag(&self, host: &str) -> Result<Tag, Miss> {
        let host = strip_port(host).trim_end_matches('.');
        let (sub, domain) = host.split_once('.').ok_or(Miss::SingleLabel)?;
        if !domain.eq_ignore_ascii_case(&self.host) {
            return Err(Miss::ForeignHost);
        }
        Tag::from_label(sub).map_err(|_| Miss::InvalidTag)
    }

    fn route(&self, request: &Request<Body>) -> Result<Router, Miss> {
        let host = request_host(request).ok_or(Miss::MissingHost)?;
        let tag = self.resolve_tag(host)?;
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .get(&tag)
            .cloned()
            .ok_or(Miss::UnknownEvent)
    }

    /// Serve `request` with the handler of the event its host names.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let handler = match self.route(&request) {
            Ok(handler) => {
                metrics::record_dispatch("routed");
                handler
            }
            Err(miss) => {
                tracing::debug!(
                    host = ?request_host(&request),
                    reason = miss.as_str(),
                    "No event for request"
                );
                metrics::record_dispatch("not_found");
                self.not_found.clone()
            }
        };

        match handler.oneshot(request).await {
            Ok(response) => response,
            Err(never) => match never {},
        }
    }
}

/// Host header, falling back to the URI authority.
fn request_host(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::event::EventConfig;
    use axum::http::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestEvent {
        config: EventConfig,
        body: &'static str,
        closes: AtomicUsize,
        fail_close: bool,
    }

    impl TestEvent {
        fn new(tag: &str, body: &'static str) -> Arc<Self> {
            Self::build(tag, body, false)
        }

        fn failing(tag: &str) -> Arc<Self> {
            Self::build(tag, "failing", true)
        }

        fn build(tag: &str, body: &'static str, fail_close: bool) -> Arc<Self> {
            Arc::new(Self {
                config: EventConfig::new(Tag::new(tag).unwrap(), tag),
                body,
                closes: AtomicUsize::new(0),
                fail_close,
            })
        }
    }

    impl Event for TestEvent {
        fn config(&self) -> &EventConfig {
            &self.config
        }

        fn handler(&self) -> Router {
            let body = self.body;
            Router::new().fallback(move || async move { body })
        }

        fn close(&self) -> Result<(), BoxError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err("container refused to stop".into());
            }
            Ok(())
        }
    }

    fn tag(s: &str) -> Tag {
        Tag::new(s).unwrap()
    }

    async fn get(pool: &EventPool, host: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .uri("/challenges")
            .header("Host", host)
            .body(Body::empty())
            .unwrap();
        let response = pool.dispatch(request).await;
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_resolve_tag() {
        let pool = EventPool::new("example.com");
        assert_eq!(pool.resolve_tag("foo.example.com"), Ok(tag("foo")));
        assert_eq!(pool.resolve_tag("FOO.Example.COM:8080"), Ok(tag("foo")));
        assert_eq!(pool.resolve_tag("foo.example.com."), Ok(tag("foo")));
        assert_eq!(pool.resolve_tag("example.com"), Err(Miss::ForeignHost));
        assert_eq!(pool.resolve_tag("localhost"), Err(Miss::SingleLabel));
        assert_eq!(pool.resolve_tag("foo.other.com"), Err(Miss::ForeignHost));
        assert_eq!(pool.resolve_tag("foo.bar.example.com"), Err(Miss::ForeignHost));
        assert_eq!(pool.resolve_tag("foo.example.com.evil.org"), Err(Miss::ForeignHost));
        assert_eq!(pool.resolve_tag("f_o.example.com"), Err(Miss::InvalidTag));
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_subdomain() {
        let pool = EventPool::new("example.com");
        pool.add_event(TestEvent::new("foo", "foo event"));
        pool.add_event(TestEvent::new("bar", "bar event"));

        assert_eq!(get(&pool, "foo.example.com").await, (StatusCode::OK, "foo event".into()));
        assert_eq!(get(&pool, "bar.example.com:443").await, (StatusCode::OK, "bar event".into()));
    }

    #[tokio::test]
    async fn test_dispatch_falls_back_to_not_found() {
        let pool = EventPool::new("example.com");
        pool.add_event(TestEvent::new("foo", "foo event"));

        for host in ["example.com", "localhost", "foo.other.com", "baz.example.com"] {
            let (status, _) = get(&pool, host).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "host {}", host);
        }

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(pool.dispatch(request).await.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dispatch_uses_uri_authority_without_host_header() {
        let pool = EventPool::new("example.com");
        pool.add_event(TestEvent::new("foo", "foo event"));

        let request = Request::builder()
            .uri("http://foo.example.com/x")
            .body(Body::empty())
            .unwrap();
        assert_eq!(pool.dispatch(request).await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_custom_not_found_handler() {
        let pool = EventPool::new("example.com")
            .with_not_found(Router::new().fallback(|| async { (StatusCode::GONE, "gone") }));
        let (status, body) = get(&pool, "nope.example.com").await;
        assert_eq!(status, StatusCode::GONE);
        assert_eq!(body, "gone");
    }

    #[tokio::test]
    async fn test_add_event_last_write_wins() {
        let pool = EventPool::new("example.com");
        pool.add_event(TestEvent::new("foo", "first"));
        pool.add_event(TestEvent::new("foo", "second"));

        assert_eq!(pool.len(), 1);
        assert_eq!(get(&pool, "foo.example.com").await.1, "second");
    }

    #[tokio::test]
    async fn test_remove_event() {
        let pool = EventPool::new("example.com");
        pool.add_event(TestEvent::new("foo", "foo event"));

        let removed = pool.remove_event(&tag("foo")).unwrap();
        assert_eq!(removed.config().tag, tag("foo"));
        assert!(!pool.contains(&tag("foo")));
        assert!(matches!(pool.get_event(&tag("foo")), Err(PoolError::UnknownEvent(_))));
        assert_eq!(get(&pool, "foo.example.com").await.0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_remove_unknown_event_leaves_registry() {
        let pool = EventPool::new("example.com");
        pool.add_event(TestEvent::new("foo", "foo event"));

        assert!(matches!(
            pool.remove_event(&tag("bar")),
            Err(PoolError::UnknownEvent(t)) if t == tag("bar")
        ));
        assert_eq!(pool.len(), 1);
        assert!(pool.get_event(&tag("foo")).is_ok());
    }

    #[test]
    fn test_get_all_events_is_snapshot() {
        let pool = EventPool::new("example.com");
        pool.add_event(TestEvent::new("foo", "foo event"));
        pool.add_event(TestEvent::new("bar", "bar event"));

        let snapshot = pool.get_all_events();
        pool.remove_event(&tag("foo")).unwrap();

        assert_eq!(snapshot.len(), 2);
        let mut tags: Vec<_> = snapshot.iter().map(|e| e.config().tag.to_string()).collect();
        tags.sort();
        assert_eq!(tags, ["bar", "foo"]);
    }

    #[test]
    fn test_close_attempts_all_and_returns_first_error() {
        let pool = EventPool::new("example.com");
        let ok_a = TestEvent::new("a", "a");
        let bad = TestEvent::failing("bad");
        let ok_b = TestEvent::new("b", "b");
        pool.add_event(ok_a.clone());
        pool.add_event(bad.clone());
        pool.add_event(ok_b.clone());

        let err = pool.close().unwrap_err();
        assert!(matches!(err, PoolError::Close { ref tag, .. } if tag.as_str() == "bad"));
        for event in [&ok_a, &bad, &ok_b] {
            assert_eq!(event.closes.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_and_mutation() {
        let pool = Arc::new(EventPool::new("example.com"));
        pool.add_event(TestEvent::new("stable", "stable"));

        let writer = {
            let pool = pool.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    pool.add_event(TestEvent::new("churn", "churn"));
                    pool.remove_event(&tag("churn")).unwrap();
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..50 {
                    assert_eq!(get(&pool, "stable.example.com").await.0, StatusCode::OK);
                }
            }));
        }

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(pool.len(), 1);
    }
}
