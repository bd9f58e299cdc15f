//! Process-wide registry of exposed API endpoints
//!
//! Registration keeps at most one descriptor per endpoint id. An optional
//! listener is notified after every mutation so that downstream systems can
//! publish the change.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::model::ApiInfo;

/// Callback seam notified after registry mutations
pub trait ApiChangeListener: Send + Sync {
    fn registered(&self, info: &ApiInfo);
    fn unregistered(&self, id: &str);
    fn updated(&self, info: &ApiInfo);
}

/// Registry of all currently exposed API endpoints
#[derive(Default)]
pub struct ApiRegistry {
    infos: Mutex<Vec<ApiInfo>>,
    listener: Mutex<Option<Arc<dyn ApiChangeListener>>>,
}

impl ApiRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all registered descriptors
    pub fn infos(&self) -> Vec<ApiInfo> {
        self.infos.lock().clone()
    }

    /// Register a descriptor, replacing any existing entry with the same id
    pub fn register(&self, info: ApiInfo) {
        let mut infos = self.infos.lock();
        infos.retain(|existing| existing.id != info.id);
        debug!(id = %info.id, path = %info.path, "registered api");
        infos.push(info.clone());
        drop(infos);

        if let Some(listener) = self.listener.lock().clone() {
            listener.registered(&info);
        }
    }

    /// Remove the descriptor with the given id, if any
    pub fn unregister(&self, id: &str) {
        self.infos.lock().retain(|existing| existing.id != id);
        debug!(id, "unregistered api");

        if let Some(listener) = self.listener.lock().clone() {
            listener.unregistered(id);
        }
    }

    /// Update the request timeout of every endpoint serviced by the given
    /// registry instance
    pub fn update_request_timeout(&self, controller_service_id: &str, timeout_ms: u64) {
        let mut updated = Vec::new();
        {
            let mut infos = self.infos.lock();
            for info in infos.iter_mut() {
                if info.controller_service_id.as_deref() == Some(controller_service_id) {
                    info.request_timeout_ms = timeout_ms;
                    updated.push(info.clone());
                }
            }
        }

        if let Some(listener) = self.listener.lock().clone() {
            for info in &updated {
                listener.updated(info);
            }
        }
    }

    pub fn set_listener(&self, listener: Arc<dyn ApiChangeListener>) {
        *self.listener.lock() = Some(listener);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn info(id: &str, service_id: Option<&str>) -> ApiInfo {
        ApiInfo {
            id: id.to_string(),
            controller_service_id: service_id.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = ApiRegistry::new();
        registry.register(ApiInfo {
            path: "/old".to_string(),
            ..info("a1", None)
        });
        registry.register(ApiInfo {
            path: "/new".to_string(),
            ..info("a1", None)
        });

        let infos = registry.infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].path, "/new");
    }

    #[test]
    fn test_unregister_removes() {
        let registry = ApiRegistry::new();
        registry.register(info("a1", None));
        registry.register(info("a2", None));

        registry.unregister("a1");

        let infos = registry.infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].id, "a2");
    }

    #[test]
    fn test_update_request_timeout_only_touches_owned_entries() {
        let registry = ApiRegistry::new();
        registry.register(info("a1", Some("cs1")));
        registry.register(info("a2", Some("cs2")));

        registry.update_request_timeout("cs1", 30_000);

        for entry in registry.infos() {
            match entry.id.as_str() {
                "a1" => assert_eq!(entry.request_timeout_ms, 30_000),
                "a2" => assert_eq!(entry.request_timeout_ms, 60_000),
                other => panic!("unexpected id {other}"),
            }
        }
    }

    struct CountingListener {
        registered: AtomicUsize,
        unregistered: AtomicUsize,
        updated: AtomicUsize,
    }

    impl ApiChangeListener for CountingListener {
        fn registered(&self, _info: &ApiInfo) {
            self.registered.fetch_add(1, Ordering::SeqCst);
        }

        fn unregistered(&self, _id: &str) {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
        }

        fn updated(&self, _info: &ApiInfo) {
            self.updated.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_listener_notified() {
        let registry = ApiRegistry::new();
        let listener = Arc::new(CountingListener {
            registered: AtomicUsize::new(0),
            unregistered: AtomicUsize::new(0),
            updated: AtomicUsize::new(0),
        });
        registry.set_listener(listener.clone());

        registry.register(info("a1", Some("cs1")));
        registry.update_request_timeout("cs1", 10_000);
        registry.unregister("a1");

        assert_eq!(listener.registered.load(Ordering::SeqCst), 1);
        assert_eq!(listener.updated.load(Ordering::SeqCst), 1);
        assert_eq!(listener.unregistered.load(Ordering::SeqCst), 1);
    }
}
