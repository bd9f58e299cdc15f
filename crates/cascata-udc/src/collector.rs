//! Usage data collectors
//!
//! A collector contributes one JSON fragment to a usage snapshot. Collection
//! is best-effort: any transport or parse failure is logged and yields an
//! empty fragment, never a failed snapshot.

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tracing::warn;

/// A source of one fragment of a usage snapshot
#[async_trait]
pub trait Collector: Send + Sync {
    async fn collect(&self, parameters: &Map<String, Value>) -> Map<String, Value>;
}

/// Copy `key` from `source` into `target`, falling back to `default`;
/// null/absent values are skipped
pub fn set_value(
    target: &mut Map<String, Value>,
    source: &Map<String, Value>,
    key: &str,
    default: Option<Value>,
) {
    if key.is_empty() {
        return;
    }
    let value = source.get(key).cloned().or(default);
    if let Some(value) = value
        && !value.is_null()
    {
        target.insert(key.to_string(), value);
    }
}

/// Fetches JSON from the local platform HTTP API
pub struct ApiCollector {
    client: reqwest::Client,
    base_url: String,
}

impl ApiCollector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, path: &str) -> anyhow::Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn collect_with(&self, path: &str, retrieve: fn(Value) -> Map<String, Value>) -> Map<String, Value> {
        match self.fetch(path).await {
            Ok(json) => retrieve(json),
            Err(e) => {
                warn!(path, "usage collection failed: {e}");
                Map::new()
            }
        }
    }
}

/// Collects platform information from `/flow/about`
pub struct AboutCollector {
    api: ApiCollector,
}

impl AboutCollector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiCollector::new(base_url),
        }
    }
}

#[async_trait]
impl Collector for AboutCollector {
    async fn collect(&self, _parameters: &Map<String, Value>) -> Map<String, Value> {
        self.api.collect_with("/flow/about", retrieve_about).await
    }
}

fn retrieve_about(source: Value) -> Map<String, Value> {
    let Value::Object(mut source) = source else {
        return Map::new();
    };
    if let Some(Value::Object(about)) = source.get_mut("about") {
        // local-only fields, meaningless outside the instance
        about.remove("contentViewerUrl");
        about.remove("uri");
    }
    source
}

/// Collects the deployed applications from `/flow/process-groups/root`
pub struct ApplicationsCollector {
    api: ApiCollector,
}

impl ApplicationsCollector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiCollector::new(base_url),
        }
    }
}

#[async_trait]
impl Collector for ApplicationsCollector {
    async fn collect(&self, _parameters: &Map<String, Value>) -> Map<String, Value> {
        self.api
            .collect_with("/flow/process-groups/root", retrieve_applications)
            .await
    }
}

fn retrieve_applications(source: Value) -> Map<String, Value> {
    let mut data = Map::new();

    let Some(group_flow) = source.get("processGroupFlow") else {
        return data;
    };

    if let Some(root_id) = group_flow.get("id").and_then(Value::as_str) {
        data.insert("id".to_string(), json!(root_id));
    }

    let Some(groups) = group_flow
        .get("flow")
        .and_then(|flow| flow.get("processGroups"))
        .and_then(Value::as_array)
    else {
        return data;
    };

    let mut list = Vec::new();
    for one in groups {
        let mut app = Map::new();
        if let Some(app_id) = one.get("id").and_then(Value::as_str) {
            app.insert("appId".to_string(), json!(app_id));
        }
        if let Some(name) = one
            .get("status")
            .and_then(|status| status.get("name"))
            .and_then(Value::as_str)
        {
            app.insert("appName".to_string(), json!(name));
        }
        if let Some(running) = one.get("runningCount").and_then(Value::as_i64) {
            app.insert("running".to_string(), json!(running > 0));
        }
        if let Some(revision) = one
            .get("revision")
            .and_then(|revision| revision.get("version"))
            .and_then(Value::as_i64)
        {
            app.insert("revision".to_string(), json!(revision));
        }
        list.push(Value::Object(app));
    }

    let applications = json!({
        "count": list.len(),
        "list": list,
    });
    data.insert("applications".to_string(), applications);

    data
}

/// Collects a snapshot of the host system
pub struct SystemCollector;

#[async_trait]
impl Collector for SystemCollector {
    async fn collect(&self, _parameters: &Map<String, Value>) -> Map<String, Value> {
        let mut system = sysinfo::System::new_all();
        system.refresh_all();

        let host = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut data = Map::new();
        data.insert(
            "system".to_string(),
            json!({
                "host": host,
                "os": sysinfo::System::name(),
                "osVersion": sysinfo::System::os_version(),
                "cpus": system.cpus().len(),
                "totalMemory": system.total_memory(),
                "usedMemory": system.used_memory(),
            }),
        );
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_value_prefers_source() {
        let mut target = Map::new();
        let mut source = Map::new();
        source.insert("version".to_string(), json!("1.2.0"));

        set_value(&mut target, &source, "version", Some(json!("unknown")));
        assert_eq!(target["version"], "1.2.0");
    }

    #[test]
    fn test_set_value_falls_back_to_default() {
        let mut target = Map::new();
        let source = Map::new();

        set_value(&mut target, &source, "version", Some(json!("unknown")));
        assert_eq!(target["version"], "unknown");

        set_value(&mut target, &source, "missing", None);
        assert!(!target.contains_key("missing"));
    }

    #[test]
    fn test_set_value_skips_null() {
        let mut target = Map::new();
        let mut source = Map::new();
        source.insert("version".to_string(), Value::Null);

        set_value(&mut target, &source, "version", None);
        assert!(!target.contains_key("version"));
    }

    #[test]
    fn test_retrieve_about_strips_local_fields() {
        let source = json!({
            "about": {
                "title": "Cascata",
                "version": "1.2.0",
                "contentViewerUrl": "/content-viewer",
                "uri": "http://localhost:8080/",
            }
        });

        let result = retrieve_about(source);
        let about = result["about"].as_object().unwrap();
        assert_eq!(about["version"], "1.2.0");
        assert!(!about.contains_key("contentViewerUrl"));
        assert!(!about.contains_key("uri"));
    }

    #[test]
    fn test_retrieve_applications_reshapes_groups() {
        let source = json!({
            "processGroupFlow": {
                "id": "root-1",
                "flow": {
                    "processGroups": [
                        {
                            "id": "app-1",
                            "status": {"name": "Ingest"},
                            "runningCount": 3,
                            "revision": {"version": 7},
                        },
                        {
                            "id": "app-2",
                            "status": {"name": "Archive"},
                            "runningCount": 0,
                            "revision": {"version": 1},
                        },
                    ]
                }
            }
        });

        let result = retrieve_applications(source);
        assert_eq!(result["id"], "root-1");

        let applications = result["applications"].as_object().unwrap();
        assert_eq!(applications["count"], 2);

        let list = applications["list"].as_array().unwrap();
        assert_eq!(list[0]["appId"], "app-1");
        assert_eq!(list[0]["appName"], "Ingest");
        assert_eq!(list[0]["running"], true);
        assert_eq!(list[0]["revision"], 7);
        assert_eq!(list[1]["running"], false);
    }

    #[test]
    fn test_retrieve_applications_tolerates_missing_pieces() {
        assert!(retrieve_applications(json!({})).is_empty());

        let no_flow = retrieve_applications(json!({"processGroupFlow": {"id": "root-1"}}));
        assert_eq!(no_flow["id"], "root-1");
        assert!(!no_flow.contains_key("applications"));
    }

    #[tokio::test]
    async fn test_system_collector_reports_host_facts() {
        let data = SystemCollector.collect(&Map::new()).await;
        let system = data["system"].as_object().unwrap();
        assert!(system.contains_key("host"));
        assert!(system["cpus"].as_u64().unwrap() >= 1);
    }
}
