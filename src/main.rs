//! # Harmonix Platform Backend
//!
//! Backend for the Harmonix developer portal's environment and provider
//! workflows.
//!
//! ## Overview
//!
//! The server exposes:
//!
//! 1. **Platform workflows** - promote apps, bind resources, attach and detach
//!    providers, delete providers
//! 2. **Scaffolder actions** - secrets, SSM lookups, environment provider
//!    resolution, workspace files and GitLab access tokens
//! 3. **Health and metrics** - `/healthz`, `/readyz` and `/metrics`
//!
//! Configuration is read from environment variables, see
//! [`harmonix_platform::config::PlatformConfig`].

use anyhow::Result;
use harmonix_platform::runtime::initialization::initialize;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    info!(
        "Platform backend ready on port {} (git provider {})",
        init.config.server_port,
        init.platform.git().provider()
    );

    let mut server_handle = init.server_handle;
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received, stopping");
            server_handle.abort();
        }
        _ = &mut server_handle => {
            warn!("HTTP server stopped unexpectedly");
            anyhow::bail!("HTTP server stopped");
        }
    }

    Ok(())
}
