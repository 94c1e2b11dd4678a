use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use super::{schema_of, ActionContext, TemplateAction};
use crate::error::ActionError;

const ID: &str = "opa:get-component-info";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
struct GetComponentInfoInput {
    /// The name of the component
    component_name: String,
}

#[derive(Debug, schemars::JsonSchema)]
#[allow(dead_code, reason = "schema only")]
#[serde(rename_all = "camelCase")]
struct GetComponentInfoOutput {
    /// The component name, converted to kebab case
    kebab_case_component_name: String,
}

/// Words of `text`, split on separators, case changes and digit runs
fn words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in text.split(|c: char| !c.is_ascii_alphanumeric()) {
        let chars: Vec<char> = chunk.chars().collect();
        let mut current = String::new();
        for (i, &c) in chars.iter().enumerate() {
            if i > 0 {
                let prev = chars[i - 1];
                let next = chars.get(i + 1);
                let boundary = (prev.is_ascii_lowercase() && c.is_ascii_uppercase())
                    || prev.is_ascii_digit() != c.is_ascii_digit()
                    || (prev.is_ascii_uppercase()
                        && c.is_ascii_uppercase()
                        && next.is_some_and(char::is_ascii_lowercase));
                if boundary && !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            current.push(c.to_ascii_lowercase());
        }
        if !current.is_empty() {
            words.push(current);
        }
    }
    words
}

#[must_use]
pub fn kebab_case(text: &str) -> String {
    words(text).join("-")
}

/// Derives naming variants of a component for later template steps
#[derive(Debug, Clone, Copy, Default)]
pub struct GetComponentInfoAction;

#[async_trait]
impl TemplateAction for GetComponentInfoAction {
    fn id(&self) -> &'static str {
        ID
    }

    fn description(&self) -> &'static str {
        "Sets useful component info for other actions to use"
    }

    fn input_schema(&self) -> Value {
        schema_of::<GetComponentInfoInput>()
    }

    fn output_schema(&self) -> Option<Value> {
        Some(schema_of::<GetComponentInfoOutput>())
    }

    async fn handler(&self, ctx: &mut ActionContext) -> Result<(), ActionError> {
        let input: GetComponentInfoInput = ctx.parse_input(ID)?;
        let kebab = kebab_case(&input.component_name);
        info!("Kebab case component name: {}", kebab);
        ctx.output("kebabCaseComponentName", kebab);
        Ok(())
    }
}
