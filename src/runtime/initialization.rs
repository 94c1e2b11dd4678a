//! # Initialization
//!
//! Server initialization logic including rustls setup, tracing, metrics,
//! client construction and server startup.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::actions::ActionRegistry;
use crate::aws::SdkClientFactory;
use crate::catalog::{CatalogApi, CatalogClient};
use crate::config::{resolve_platform_region, PlatformConfig};
use crate::observability;
use crate::platform::PlatformService;
use crate::scm::GitServiceFactory;
use crate::server::{start_server, ServerState};

/// Initialization result containing all necessary components for the server
pub struct InitializationResult {
    pub config: PlatformConfig,
    pub platform: PlatformService,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub server_handle: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("config", &self.config)
            .field(
                "server_ready",
                &self.server_state.is_ready.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

/// Install the rustls crypto provider
///
/// Must run before any TLS client is built.
pub fn install_crypto_provider() {
    // A second install only fails when a provider is already set
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// Initialize the platform server
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - Configuration validation, including platform region discovery
/// - Git, AWS and catalog client construction
/// - HTTP server startup
pub async fn initialize() -> Result<InitializationResult> {
    install_crypto_provider();

    let mut config = PlatformConfig::from_env();
    observability::logging::init_tracing(&config.log_format, config.log_enable_color);

    info!("Starting Harmonix platform backend");
    info!(
        "Build info: version={}, built={}, git_hash={}",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    if config.enable_metrics {
        observability::metrics::register_metrics()?;
    }

    let client = reqwest::Client::builder()
        .user_agent(concat!("harmonix-platform/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;

    resolve_platform_region(&mut config, &client).await;
    config.validate().context("Invalid platform configuration")?;
    let git_provider = config.git_provider()?;
    let platform_region = config.platform_region()?.to_string();
    info!("Configuration: {:?}", config);

    let git = GitServiceFactory::new(git_provider, client.clone(), config.scm_endpoints());
    let mut catalog = CatalogClient::new(client.clone(), config.catalog_base_url.clone());
    if let Some(token) = config.catalog_token.as_deref() {
        catalog = catalog.with_token(token.as_str());
    }
    let catalog: Arc<dyn CatalogApi> = Arc::new(catalog);
    let platform = PlatformService::new(
        git,
        Arc::new(SdkClientFactory),
        catalog,
        platform_region,
    );

    let actions = ActionRegistry::with_builtin(
        platform.clone(),
        config.integrations.clone(),
        client,
    )
    .context("Failed to register scaffolder actions")?;
    info!(
        "Registered scaffolder actions: {}",
        actions.list().map(|a| a.id()).collect::<Vec<_>>().join(", ")
    );

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
        platform: platform.clone(),
        actions: Arc::new(actions),
        automation_key: config.automation_key.clone(),
        workspace_root: config.workspace_root.clone(),
    });

    let server_port = config.server_port;
    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    wait_for_server_ready(&server_state, &server_handle, &config).await?;

    Ok(InitializationResult {
        config,
        platform,
        server_state,
        server_handle,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    config: &PlatformConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            break;
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }

    Ok(())
}
