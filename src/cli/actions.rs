use anyhow::Result;
use harmonix_platform::actions::ActionRegistry;
use harmonix_platform::aws::SdkClientFactory;
use harmonix_platform::catalog::CatalogClient;
use harmonix_platform::config::PlatformConfig;
use harmonix_platform::constants::DRY_RUN_PLATFORM_REGION;
use harmonix_platform::platform::PlatformService;
use harmonix_platform::runtime::initialization::install_crypto_provider;
use harmonix_platform::scm::{GitProviders, GitServiceFactory};
use std::sync::Arc;

/// Registry built from local configuration; no handler is invoked
fn registry() -> Result<ActionRegistry> {
    install_crypto_provider();
    let config = PlatformConfig::from_env();
    let client = reqwest::Client::new();
    let provider = config.git_provider().unwrap_or(GitProviders::GitLab);
    let platform = PlatformService::new(
        GitServiceFactory::new(provider, client.clone(), config.scm_endpoints()),
        Arc::new(SdkClientFactory),
        Arc::new(CatalogClient::new(client.clone(), config.catalog_base_url.clone())),
        config
            .platform_region
            .clone()
            .unwrap_or_else(|| DRY_RUN_PLATFORM_REGION.to_string()),
    );
    Ok(ActionRegistry::with_builtin(
        platform,
        config.integrations,
        client,
    )?)
}

pub fn actions_command(schemas: bool) -> Result<()> {
    let registry = registry()?;
    for action in registry.list() {
        let dry_run = if action.supports_dry_run() { "dry-run" } else { "" };
        println!("{:<36} {:<8} {}", action.id(), dry_run, action.description());
        if schemas {
            println!("{}", serde_json::to_string_pretty(&action.input_schema())?);
        }
    }
    Ok(())
}
