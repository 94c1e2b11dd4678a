use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{schema_of, ActionContext, TemplateAction};
use crate::constants::DRY_RUN_PLATFORM_REGION;
use crate::error::ActionError;
use crate::platform::PlatformService;

const ID: &str = "opa:get-platform-metadata";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct NoInput {}

/// Exposes where the platform itself runs
#[derive(Debug, Clone)]
pub struct GetPlatformMetadataAction {
    platform: PlatformService,
}

impl GetPlatformMetadataAction {
    #[must_use]
    pub fn new(platform: PlatformService) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl TemplateAction for GetPlatformMetadataAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Returns metadata about the platform"
    }

    fn input_schema(&self) -> Value {
        schema_of::<NoInput>()
    }

    async fn handler(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        let region = if ctx.dry_run {
            DRY_RUN_PLATFORM_REGION.to_string()
        } else {
            self.platform.platform_region().to_string()
        };
        ctx.output("platformRegion", region);
        Ok(())
    }
}
