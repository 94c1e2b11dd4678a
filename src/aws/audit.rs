//! Audit records written to the provider's DynamoDB audit table.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{info, warn};

use super::{AwsAuthResponse, AwsSdkService};
use crate::constants::AUDIT_ORIGIN;
use crate::error::AwsError;
use crate::observability::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Started,
    Success,
    Failed,
}

impl AuditStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AuditStatus::Started => "STARTED",
            AuditStatus::Success => "SUCCESS",
            AuditStatus::Failed => "FAILED",
        }
    }
}

/// One auditable action against a provider account
#[derive(Debug, Clone)]
pub struct AuditRecordInput {
    pub prefix: String,
    pub provider_name: String,
    pub app_name: String,
    pub role_arn: String,
    pub account: String,
    pub region: String,
    pub requester: String,
    pub owner: String,
    pub action_type: String,
    pub action_name: String,
    pub request_args: Option<String>,
    pub status: AuditStatus,
    pub message: Option<String>,
}

impl AuditRecordInput {
    /// Successful `action_type` performed through the operations role in `auth`
    #[must_use]
    pub fn for_session(
        auth: &AwsAuthResponse,
        prefix: &str,
        provider_name: &str,
        action_type: &str,
        action_name: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.to_string(),
            provider_name: provider_name.to_string(),
            app_name: String::new(),
            role_arn: auth.role_arn.clone(),
            account: auth.account.clone(),
            region: auth.region.clone(),
            requester: auth.requester.clone(),
            owner: auth.owner.clone().unwrap_or_default(),
            action_type: action_type.to_string(),
            action_name: action_name.into(),
            request_args: None,
            status: AuditStatus::Success,
            message: None,
        }
    }
}

/// SSM parameter holding the audit table name
#[must_use]
pub fn audit_table_parameter(prefix: &str, provider_name: &str) -> String {
    let provider = provider_name.to_lowercase();
    format!("/{}/{provider}/{provider}-audit", prefix.to_lowercase())
}

#[must_use]
pub fn record_id(input: &AuditRecordInput, at: DateTime<Utc>) -> String {
    format!(
        "{}#{}#{}#{}#{}#{}#{}#{}",
        input.account,
        input.region,
        input.prefix,
        input.provider_name,
        input.app_name,
        input.requester,
        input.action_type,
        at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    )
}

fn audit_item(input: &AuditRecordInput, at: DateTime<Utc>) -> BTreeMap<String, String> {
    let fields = [
        ("id", record_id(input, at)),
        ("createdAt", at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        ("createdDate", at.format("%Y-%m-%d").to_string()),
        ("origin", AUDIT_ORIGIN.to_string()),
        ("appName", input.app_name.clone()),
        ("actionType", input.action_type.clone()),
        ("actionName", input.action_name.clone()),
        ("initiatedBy", input.requester.clone()),
        ("owner", input.owner.clone()),
        ("assumedRole", input.role_arn.clone()),
        ("targetAccount", input.account.clone()),
        ("targetRegion", input.region.clone()),
        ("prefix", input.prefix.clone()),
        ("providerName", input.provider_name.clone()),
        ("request", input.request_args.clone().unwrap_or_default()),
        ("status", input.status.as_str().to_string()),
        ("message", input.message.clone().unwrap_or_default()),
    ];
    fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Write an audit record; returns the record id.
///
/// The caller's AWS mutation has already happened at this point and is never
/// undone when the audit write fails.
pub async fn create_audit_record(
    client: &dyn AwsSdkService,
    input: &AuditRecordInput,
) -> Result<String, AwsError> {
    let result = async {
        let parameter = audit_table_parameter(&input.prefix, &input.provider_name);
        let table = client
            .get_ssm_parameter(&parameter)
            .await?
            .ok_or(AwsError::MissingField {
                service: "ssm",
                operation: "GetParameter",
                field: "audit table name",
            })?;
        let now = Utc::now();
        let item = audit_item(input, now);
        client.put_item(&table, &item).await?;
        Ok(record_id(input, now))
    }
    .await;

    match &result {
        Ok(id) => info!("Audit record {} written", id),
        Err(e) => {
            metrics::increment_audit_write_errors();
            warn!(
                "Audit write failed for {} on {}: {}",
                input.action_name, input.provider_name, e
            );
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn input() -> AuditRecordInput {
        AuditRecordInput {
            prefix: "OPA".to_string(),
            provider_name: "Dev-ECS".to_string(),
            app_name: "orders".to_string(),
            role_arn: "arn:aws:iam::123456789012:role/opa-dev-ecs-operations-role".to_string(),
            account: "123456789012".to_string(),
            region: "us-east-1".to_string(),
            requester: "jane".to_string(),
            owner: "platform-team".to_string(),
            action_type: "Create Secret".to_string(),
            action_name: "orders-db".to_string(),
            request_args: None,
            status: AuditStatus::Success,
            message: None,
        }
    }

    #[test]
    fn test_table_parameter_is_lower_cased() {
        assert_eq!(audit_table_parameter("OPA", "Dev-ECS"), "/opa/dev-ecs/dev-ecs-audit");
    }

    #[test]
    fn test_record_id_layout() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        assert_eq!(
            record_id(&input(), at),
            "123456789012#us-east-1#OPA#Dev-ECS#orders#jane#Create Secret#2024-03-01T12:30:00.000Z"
        );
    }

    #[test]
    fn test_item_carries_origin_and_defaults() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let item = audit_item(&input(), at);
        assert_eq!(item["origin"], "Backstage-SDK");
        assert_eq!(item["status"], "SUCCESS");
        assert_eq!(item["request"], "");
        assert_eq!(item["createdDate"], "2024-03-01");
        assert_eq!(item.len(), 17);
    }
}
