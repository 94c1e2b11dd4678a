use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{schema_of, ActionContext, TemplateAction};
use crate::error::ActionError;

const ID: &str = "opa:fs:write";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct FsWriteInput {
    /// Relative path inside the workspace
    path: String,
    content: String,
    /// Pretty-print the content when it parses as JSON
    #[serde(default)]
    format_json_content: bool,
}

fn render(content: &str, format_json: bool) -> String {
    if !format_json {
        return content.to_string();
    }
    match serde_json::from_str::<Value>(content) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| content.to_string()),
        Err(e) => {
            warn!("Content is not valid JSON, writing it unformatted: {}", e);
            content.to_string()
        }
    }
}

/// Writes a file into the template workspace
#[derive(Debug, Clone, Copy, Default)]
pub struct FsWriteAction;

#[async_trait]
impl TemplateAction for FsWriteAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Creates a file with the content on the given path"
    }

    fn input_schema(&self) -> Value {
        schema_of::<FsWriteInput>()
    }

    async fn handler(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        let input: FsWriteInput = ctx.parse_input(ID)?;
        let destination = ctx.resolve_safe_child_path(&input.path)?;
        let io_error = |source: std::io::Error| ActionError::Io {
            path: input.path.clone(),
            source,
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let content = render(&input.content, input.format_json_content);
        tokio::fs::write(&destination, content).await.map_err(io_error)?;
        info!("Wrote {}", destination.display());

        ctx.output("path", destination.display().to_string());
        Ok(())
    }
}
