//! Bounded registry of pending HTTP exchanges with time-based eviction

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cascata_api::ApiRegistry;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::model::{
    ContextMapConfig, ContextMapError, HttpRequestInfo, ResponseDirective, ResponseHandle,
};

struct PendingExchange {
    request: HttpRequestInfo,
    handle: ResponseHandle,
    additions: Map<String, Value>,
    registered_at: Instant,
}

/// Registry of HTTP exchanges awaiting a response
///
/// Holds at most `max_outstanding_requests` entries keyed by a caller-supplied
/// identifier. Entries left unanswered longer than `request_expiration` are
/// evicted by the sweeper and answered with
/// [`ResponseDirective::ServiceUnavailable`].
pub struct HttpContextMap {
    id: String,
    entries: DashMap<String, PendingExchange>,
    // Admission counter; reserved before insert so concurrent registration
    // cannot exceed capacity
    outstanding: AtomicUsize,
    config: ContextMapConfig,
    api_registry: Option<Arc<ApiRegistry>>,
    running: AtomicBool,
}

impl HttpContextMap {
    pub fn new(id: impl Into<String>, config: ContextMapConfig) -> Self {
        Self {
            id: id.into(),
            entries: DashMap::new(),
            outstanding: AtomicUsize::new(0),
            config,
            api_registry: None,
            running: AtomicBool::new(false),
        }
    }

    /// Registry wired to an [`ApiRegistry`]; endpoints serviced by this map
    /// pick up its request expiration as their request timeout
    pub fn with_api_registry(
        id: impl Into<String>,
        config: ContextMapConfig,
        api_registry: Arc<ApiRegistry>,
    ) -> Self {
        let map = Self {
            api_registry: Some(api_registry),
            ..Self::new(id, config)
        };
        map.refresh_api_timeouts();
        map
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The configured request expiration
    pub fn request_timeout(&self) -> Duration {
        self.config.request_expiration
    }

    /// Push the request expiration to every endpoint serviced by this map
    pub fn refresh_api_timeouts(&self) {
        if let Some(registry) = &self.api_registry {
            registry
                .update_request_timeout(&self.id, self.config.request_expiration.as_millis() as u64);
        }
    }

    /// Register a pending exchange
    ///
    /// Returns `Ok(false)` when the registry is at capacity, and an
    /// illegal-state error when `identifier` is already registered. The
    /// capacity check and the insert are atomic: concurrent registration can
    /// never admit beyond capacity.
    pub fn register(
        &self,
        identifier: &str,
        request: HttpRequestInfo,
        handle: ResponseHandle,
        additions: Map<String, Value>,
    ) -> Result<bool, ContextMapError> {
        let max = self.config.max_outstanding_requests;
        let reserved = self
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |outstanding| {
                (outstanding < max).then_some(outstanding + 1)
            });
        if reserved.is_err() {
            debug!(identifier, max, "refusing registration, registry full");
            return Ok(false);
        }

        match self.entries.entry(identifier.to_string()) {
            Entry::Occupied(_) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                Err(ContextMapError::AlreadyRegistered(identifier.to_string()))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(PendingExchange {
                    request,
                    handle,
                    additions,
                    registered_at: Instant::now(),
                });
                Ok(true)
            }
        }
    }

    /// Snapshot of the request registered under `identifier`, if any
    pub fn request_info(&self, identifier: &str) -> Option<HttpRequestInfo> {
        self.entries
            .get(identifier)
            .map(|entry| entry.request.clone())
    }

    /// Additional values attached at registration; empty for an unknown id
    pub fn additions(&self, identifier: &str) -> Map<String, Value> {
        self.entries
            .get(identifier)
            .map(|entry| entry.additions.clone())
            .unwrap_or_default()
    }

    /// Finish the exchange registered under `identifier`
    ///
    /// Removes the entry and delivers [`ResponseDirective::Complete`]. An
    /// unknown identifier is an illegal-state error.
    pub fn complete(&self, identifier: &str) -> Result<(), ContextMapError> {
        let (_, exchange) = self
            .entries
            .remove(identifier)
            .ok_or_else(|| ContextMapError::NotRegistered(identifier.to_string()))?;
        self.outstanding.fetch_sub(1, Ordering::SeqCst);

        if exchange.handle.send(ResponseDirective::Complete).is_err() {
            debug!(identifier, "requester no longer waiting on completion");
        }
        Ok(())
    }

    /// Number of currently outstanding exchanges
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict every entry older than the request expiration, answering each
    /// with "service unavailable"
    ///
    /// Returns the number of entries evicted. The sweeper loop calls this on a
    /// fixed period; it is also directly callable.
    pub fn sweep_expired_once(&self) -> usize {
        let expiration = self.config.request_expiration;
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.registered_at.elapsed() >= expiration)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for identifier in expired {
            // re-check under the entry lock so a concurrent complete() wins
            let removed = self
                .entries
                .remove_if(&identifier, |_, exchange| {
                    exchange.registered_at.elapsed() >= expiration
                });
            if let Some((_, exchange)) = removed {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                evicted += 1;
                warn!(
                    identifier,
                    uri = %exchange.request.uri,
                    "request expired unanswered, sending service unavailable"
                );
                // the requester may be gone already; nothing to do then
                let _ = exchange.handle.send(ResponseDirective::ServiceUnavailable);
            }
        }
        evicted
    }

    /// Run the expiration sweeper until [`stop`](Self::stop) is called
    ///
    /// The sweep period is half the request expiration. Starting an already
    /// running sweeper returns immediately.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            info!(id = %self.id, "context map sweeper already running");
            return;
        }

        info!(id = %self.id, "starting context map sweeper");

        let period = (self.config.request_expiration / 2).max(Duration::from_millis(1));
        let mut interval = tokio::time::interval(period);
        // the first tick fires immediately; skip it so a fresh entry is never
        // swept before one full period elapsed
        interval.tick().await;

        while self.running.load(Ordering::SeqCst) {
            interval.tick().await;

            let evicted = self.sweep_expired_once();
            if evicted > 0 {
                info!(id = %self.id, evicted, "evicted expired requests");
            }
        }

        info!(id = %self.id, "context map sweeper stopped");
    }

    /// Stop the sweeper loop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}
