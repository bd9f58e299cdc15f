//! Main entry point for the Cascata platform services runtime.
//!
//! Wires the API registry, the outstanding-request registry and its sweeper,
//! the authentication/authorization layer, and the usage-data scheduler, then
//! waits for a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use cascata_api::ApiRegistry;
use cascata_auth::{
    AccessPolicyProviderHandle, AuthenticationService, AuthorizerConfig, ManagedAuthorizer,
    MemoryAccessPolicyProvider, MemoryUserGroupProvider, RequestAction, UserGroupProviderHandle,
};
use cascata_http::HttpContextMap;
use cascata_server::{Configuration, startup};
use cascata_udc::{
    AboutCollector, ApplicationsCollector, FileFrequency, SystemCollector, UsageDataManager,
};
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize configuration and logging
    let configuration = Configuration::new();
    let _logging_guards = startup::init_logging(&configuration.logging_config())?;

    // API registry and outstanding-request registry
    let api_registry = Arc::new(ApiRegistry::new());
    let context_map = Arc::new(HttpContextMap::with_api_registry(
        "http-context-map",
        configuration.context_map_config(),
        api_registry.clone(),
    ));
    info!(
        expiration = ?context_map.request_timeout(),
        "outstanding-request registry ready"
    );
    let sweeper = {
        let context_map = context_map.clone();
        tokio::spawn(async move { context_map.start().await })
    };

    // Authentication and authorization
    let authentication = AuthenticationService::new(configuration.authentication_config());
    info!(
        credentials_checked = authentication.should_authenticate(),
        "authentication service ready"
    );

    let user_group_provider = Arc::new(MemoryUserGroupProvider::new());
    let access_policy_provider = Arc::new(MemoryAccessPolicyProvider::new(vec![
        ("/flow".to_string(), RequestAction::Read),
        ("/flow".to_string(), RequestAction::Write),
    ]));
    let authorizer = ManagedAuthorizer::new(
        UserGroupProviderHandle::Configurable(user_group_provider),
        AccessPolicyProviderHandle::Configurable(access_policy_provider),
        AuthorizerConfig {
            admin_identity: configuration.admin_identity(),
            auto_generate_users: configuration.user_auto_generate(),
        },
    );
    debug!(
        fingerprint_bytes = authorizer.fingerprint()?.len(),
        "managed authorizer ready"
    );

    // Usage data collection
    let base_url = configuration.web_api_base_url();
    let mut usage_manager = UsageDataManager::new(
        configuration.usage_repository_directory(),
        configuration.usage_file_frequency(),
    );
    usage_manager.register_collector(Arc::new(AboutCollector::new(&base_url)));
    usage_manager.register_collector(Arc::new(ApplicationsCollector::new(&base_url)));
    usage_manager.register_collector(Arc::new(SystemCollector));
    let usage_manager = Arc::new(usage_manager);

    let refresh_interval = configuration.usage_refresh_interval();
    if configuration.usage_file_frequency() == FileFrequency::Daily {
        info!("usage snapshots kept daily, retention purge disabled");
    }
    let usage_scheduler = {
        let usage_manager = usage_manager.clone();
        tokio::spawn(async move { usage_manager.start(refresh_interval).await })
    };

    // Wait for shutdown and stop the background services
    let shutdown_signal = startup::wait_for_shutdown_signal().await;
    let graceful_shutdown =
        startup::GracefulShutdown::new(shutdown_signal.clone(), Duration::from_secs(5));
    graceful_shutdown.wait_for_shutdown().await;

    context_map.stop();
    usage_manager.stop();
    sweeper.abort();
    usage_scheduler.abort();

    info!("Cascata runtime shutdown complete");
    Ok(())
}
