//! Descriptor models for exposed HTTP API endpoints

use serde::{Deserialize, Serialize};

/// Default request timeout, same as the default request expiration of the
/// outstanding-request registry
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 60 * 1000;

/// Lifecycle state of an exposed API endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiState {
    #[default]
    Init,
    Running,
    Stopped,
}

impl std::fmt::Display for ApiState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ApiState::Init => "init",
            ApiState::Running => "running",
            ApiState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

/// Descriptor of one HTTP API endpoint exposed by a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiInfo {
    pub name: String,
    pub id: String,
    pub group_id: String,
    pub path: String,
    pub host: String,
    pub charset: String,
    pub scheme: String,
    pub port: u16,
    pub request_timeout_ms: u64,
    pub allow_get: bool,
    pub allow_post: bool,
    pub allow_put: bool,
    pub allow_delete: bool,
    pub allow_head: bool,
    pub allow_options: bool,
    pub state: ApiState,
    /// Id of the registry instance servicing this endpoint's requests.
    /// Not part of the published descriptor.
    #[serde(skip)]
    pub controller_service_id: Option<String>,
}

impl Default for ApiInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            id: String::new(),
            group_id: String::new(),
            path: String::new(),
            host: String::new(),
            charset: "UTF-8".to_string(),
            scheme: "http".to_string(),
            port: 80,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            allow_get: false,
            allow_post: false,
            allow_put: false,
            allow_delete: false,
            allow_head: false,
            allow_options: false,
            state: ApiState::default(),
            controller_service_id: None,
        }
    }
}

impl ApiInfo {
    /// Published copy of the descriptor, without the internal service link
    pub fn published(&self) -> ApiInfo {
        ApiInfo {
            controller_service_id: None,
            ..self.clone()
        }
    }
}
