//! Configuration for the Cascata runtime
//!
//! Settings are layered from `conf/application.yml`, the `CASCATA`-prefixed
//! environment, and command-line overrides. Every getter carries the default
//! the platform ships with.

use std::path::PathBuf;
use std::time::Duration;

use cascata_auth::{AuthMethod, AuthenticationConfig};
use cascata_common::parse_time_period;
use cascata_http::ContextMapConfig;
use cascata_udc::FileFrequency;
use clap::Parser;
use config::{Config, Environment};
use tracing::warn;

use crate::startup::logging::{LogRotation, LoggingConfig};

const KEY_WEB_HTTP_HOST: &str = "cascata.web.http.host";
const KEY_WEB_HTTP_PORT: &str = "cascata.web.http.port";
const KEY_WEB_API_CONTEXT: &str = "cascata.web.api.context";

const KEY_REPO_DIR: &str = "cascata.usage.repository.directory";
const DEFAULT_REPO_DIR: &str = "./usage_repository";
const KEY_REPO_REFRESH: &str = "cascata.usage.repository.autorefresh.interval";
const DEFAULT_REPO_REFRESH: &str = "12 hours";
const KEY_REPO_FILE_FREQ: &str = "cascata.usage.repository.file.frequency";

const KEY_CONTEXT_MAX_REQUESTS: &str = "cascata.http.context.max.outstanding.requests";
const KEY_CONTEXT_EXPIRATION: &str = "cascata.http.context.request.expiration";
const DEFAULT_CONTEXT_EXPIRATION: &str = "1 min";

const KEY_ADMIN_IDENTITY: &str = "cascata.security.admin.identity";
const KEY_USER_AUTO_GENERATE: &str = "cascata.security.user.auto.generate";

const KEY_AUTH_METHOD: &str = "cascata.auth.method";
const KEY_AUTH_USERS: &str = "cascata.auth.users";
const KEY_AUTH_REALM: &str = "cascata.auth.realm";
const KEY_AUTH_NONCE: &str = "cascata.auth.nonce";
const KEY_AUTH_WHITE_LIST: &str = "cascata.auth.white.list";
const KEY_AUTH_BLACK_LIST: &str = "cascata.auth.black.list";

const KEY_LOGS_PATH: &str = "cascata.logs.path";

/// Command line arguments for the runtime
#[derive(Debug, Parser)]
#[command(name = "cascata-server")]
struct Cli {
    #[arg(short = 'c', long = "config", env = "CASCATA_CONFIG")]
    config: Option<String>,
    #[arg(long = "repository-dir")]
    repository_dir: Option<String>,
    #[arg(long = "log-dir", env = "CASCATA_LOG_DIR")]
    log_dir: Option<String>,
}

/// Application configuration loaded from config files and environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new() -> Self {
        let args = Cli::parse();
        let config_file = args.config.as_deref().unwrap_or("conf/application.yml");

        let mut config_builder = Config::builder()
            .add_source(
                Environment::with_prefix("cascata")
                    .separator(".")
                    .try_parsing(true),
            )
            .add_source(config::File::with_name(config_file).required(false));

        if let Some(v) = args.repository_dir {
            config_builder = config_builder
                .set_override(KEY_REPO_DIR, v)
                .expect("Failed to set repository directory override");
        }
        if let Some(v) = args.log_dir {
            config_builder = config_builder
                .set_override(KEY_LOGS_PATH, v)
                .expect("Failed to set log directory override");
        }

        let app_config = config_builder
            .build()
            .expect("Failed to build configuration");

        Configuration { config: app_config }
    }

    /// Wrap an already built [`Config`]
    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    // ========================================================================
    // Web API (collector source)
    // ========================================================================

    pub fn web_http_host(&self) -> String {
        self.config
            .get_string(KEY_WEB_HTTP_HOST)
            .unwrap_or("127.0.0.1".to_string())
    }

    pub fn web_http_port(&self) -> u16 {
        self.config.get_int(KEY_WEB_HTTP_PORT).unwrap_or(8080) as u16
    }

    pub fn web_api_context(&self) -> String {
        self.config
            .get_string(KEY_WEB_API_CONTEXT)
            .unwrap_or("/cascata-api".to_string())
    }

    /// Base URL of the local platform HTTP API
    pub fn web_api_base_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.web_http_host(),
            self.web_http_port(),
            self.web_api_context()
        )
    }

    // ========================================================================
    // Usage data collection
    // ========================================================================

    pub fn usage_repository_directory(&self) -> PathBuf {
        PathBuf::from(
            self.config
                .get_string(KEY_REPO_DIR)
                .unwrap_or(DEFAULT_REPO_DIR.to_string()),
        )
    }

    pub fn usage_refresh_interval(&self) -> Duration {
        let value = self
            .config
            .get_string(KEY_REPO_REFRESH)
            .unwrap_or(DEFAULT_REPO_REFRESH.to_string());
        parse_time_period(&value).unwrap_or_else(|e| {
            warn!("invalid usage refresh interval '{value}': {e}");
            parse_time_period(DEFAULT_REPO_REFRESH).expect("default interval parses")
        })
    }

    pub fn usage_file_frequency(&self) -> FileFrequency {
        self.config
            .get_string(KEY_REPO_FILE_FREQ)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    // ========================================================================
    // Outstanding-request registry
    // ========================================================================

    pub fn context_map_config(&self) -> ContextMapConfig {
        let defaults = ContextMapConfig::default();
        let max_outstanding_requests = self
            .config
            .get_int(KEY_CONTEXT_MAX_REQUESTS)
            .map(|max| max as usize)
            .unwrap_or(defaults.max_outstanding_requests);

        let expiration_value = self
            .config
            .get_string(KEY_CONTEXT_EXPIRATION)
            .unwrap_or(DEFAULT_CONTEXT_EXPIRATION.to_string());
        let request_expiration = parse_time_period(&expiration_value).unwrap_or_else(|e| {
            warn!("invalid request expiration '{expiration_value}': {e}");
            defaults.request_expiration
        });

        ContextMapConfig {
            max_outstanding_requests,
            request_expiration,
        }
    }

    // ========================================================================
    // Security
    // ========================================================================

    pub fn admin_identity(&self) -> Option<String> {
        self.config.get_string(KEY_ADMIN_IDENTITY).ok()
    }

    pub fn user_auto_generate(&self) -> bool {
        self.config.get_bool(KEY_USER_AUTO_GENERATE).unwrap_or(true)
    }

    pub fn authentication_config(&self) -> AuthenticationConfig {
        let method: Option<AuthMethod> = self
            .config
            .get_string(KEY_AUTH_METHOD)
            .ok()
            .and_then(|value| match value.parse() {
                Ok(method) => Some(method),
                Err(e) => {
                    warn!("{e}");
                    None
                }
            });

        let nonce = self.config.get_string(KEY_AUTH_NONCE).ok().or_else(|| {
            // Digest needs a server nonce even when none is configured
            (method == Some(AuthMethod::Digest)).then(cascata_auth::random_nonce)
        });

        AuthenticationConfig {
            white_list: self.config.get_string(KEY_AUTH_WHITE_LIST).ok(),
            black_list: self.config.get_string(KEY_AUTH_BLACK_LIST).ok(),
            method,
            authorized_users: self.config.get_string(KEY_AUTH_USERS).ok(),
            realm: self.config.get_string(KEY_AUTH_REALM).ok(),
            nonce,
        }
    }

    // ========================================================================
    // Logging
    // ========================================================================

    pub fn logs_path(&self) -> Option<PathBuf> {
        self.config.get_string(KEY_LOGS_PATH).ok().map(PathBuf::from)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            dir: self.logs_path(),
            rotation: LogRotation::Daily,
            level: "info".to_string(),
            console: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configuration(overrides: &[(&str, &str)]) -> Configuration {
        let mut builder = Config::builder();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        Configuration::from_config(builder.build().unwrap())
    }

    #[test]
    fn test_defaults() {
        let configuration = configuration(&[]);
        assert_eq!(
            configuration.web_api_base_url(),
            "http://127.0.0.1:8080/cascata-api"
        );
        assert_eq!(
            configuration.usage_repository_directory(),
            PathBuf::from("./usage_repository")
        );
        assert_eq!(
            configuration.usage_refresh_interval(),
            Duration::from_secs(12 * 3600)
        );
        assert_eq!(configuration.usage_file_frequency(), FileFrequency::Monthly);
        assert!(configuration.user_auto_generate());
        assert!(configuration.admin_identity().is_none());

        let context = configuration.context_map_config();
        assert_eq!(context.max_outstanding_requests, 5000);
        assert_eq!(context.request_expiration, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let configuration = configuration(&[
            ("cascata.web.http.port", "9090"),
            ("cascata.usage.repository.file.frequency", "weekly"),
            ("cascata.http.context.max.outstanding.requests", "100"),
            ("cascata.http.context.request.expiration", "30 secs"),
            ("cascata.security.admin.identity", "root"),
        ]);

        assert_eq!(configuration.web_http_port(), 9090);
        assert_eq!(configuration.usage_file_frequency(), FileFrequency::Weekly);
        assert_eq!(configuration.admin_identity().as_deref(), Some("root"));

        let context = configuration.context_map_config();
        assert_eq!(context.max_outstanding_requests, 100);
        assert_eq!(context.request_expiration, Duration::from_secs(30));
    }

    #[test]
    fn test_invalid_expiration_falls_back_to_default() {
        let configuration =
            configuration(&[("cascata.http.context.request.expiration", "whenever")]);
        assert_eq!(
            configuration.context_map_config().request_expiration,
            Duration::from_secs(60)
        );
    }

    #[test]
    fn test_authentication_config_digest_gets_a_nonce() {
        let configuration = configuration(&[
            ("cascata.auth.method", "digest"),
            ("cascata.auth.users", "user1:pwd1"),
            ("cascata.auth.realm", "cascata"),
        ]);

        let auth = configuration.authentication_config();
        assert_eq!(auth.method, Some(AuthMethod::Digest));
        assert!(!auth.nonce.unwrap().is_empty());
    }

    #[test]
    fn test_authentication_config_without_method() {
        let auth = configuration(&[]).authentication_config();
        assert!(auth.method.is_none());
        assert!(auth.nonce.is_none());
    }
}
