//! # Operations Role Authentication
//!
//! Every environment provider owns an operations role named
//! `{prefix}-{provider}-operations-role`. Platform calls against a provider
//! account assume that role for the requesting user.

use aws_credential_types::Credentials;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info_span, Instrument};

use crate::constants::ASSUME_ROLE_DURATION_SECS;
use crate::error::AwsError;
use crate::observability::metrics;

static ACCOUNT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{12}$").expect("Failed to compile account id regex - this should never happen")
});

static REGION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}-[a-z]{4,}-\d+$")
        .expect("Failed to compile region regex - this should never happen")
});

pub fn validate_account_id(account_id: &str) -> Result<(), AwsError> {
    if ACCOUNT_ID_RE.is_match(account_id) {
        Ok(())
    } else {
        Err(AwsError::InvalidAccount(account_id.to_string()))
    }
}

pub fn validate_region(region: &str) -> Result<(), AwsError> {
    if REGION_RE.is_match(region) {
        Ok(())
    } else {
        Err(AwsError::InvalidRegion(region.to_string()))
    }
}

#[must_use]
pub fn operations_role_arn(account_id: &str, prefix: &str, provider_name: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{prefix}-{provider_name}-operations-role")
}

/// Who wants to act on which provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsAuthRequest {
    pub account_id: String,
    pub region: String,
    pub prefix: String,
    pub provider_name: String,
    /// Catalog name of the requesting user
    pub user_name: String,
    /// Ownership refs of the requesting user (`group:default/team`)
    pub ownership_refs: Vec<String>,
}

impl AwsAuthRequest {
    pub fn validate(&self) -> Result<(), AwsError> {
        validate_account_id(&self.account_id)?;
        validate_region(&self.region)
    }

    #[must_use]
    pub fn role_arn(&self) -> String {
        operations_role_arn(&self.account_id, &self.prefix, &self.provider_name)
    }

    #[must_use]
    pub fn session_name(&self) -> String {
        format!("{}-backstage-session", self.user_name)
    }

    /// First group the user belongs to, ignoring `everyone`
    #[must_use]
    pub fn owner(&self) -> Option<String> {
        self.ownership_refs.iter().find_map(|r| {
            let (kind, rest) = r.split_once(':')?;
            let name = rest.rsplit_once('/').map_or(rest, |(_, name)| name);
            (kind.eq_ignore_ascii_case("group") && name != "everyone").then(|| name.to_string())
        })
    }
}

/// Credentials obtained for an [`AwsAuthRequest`]
#[derive(Debug, Clone)]
pub struct AwsAuthResponse {
    pub credentials: Credentials,
    pub requester: String,
    pub owner: Option<String>,
    pub role_arn: String,
    pub account: String,
    pub region: String,
}

/// Assume the provider's operations role through STS
pub async fn assume_operations_role(
    sts: &aws_sdk_sts::Client,
    request: &AwsAuthRequest,
) -> Result<AwsAuthResponse, AwsError> {
    request.validate()?;
    let role_arn = request.role_arn();
    let span = info_span!("sts.assume_role", role_arn = %role_arn, requester = %request.user_name);
    async move {
        debug!("Fetching credentials for mapped role: {}", role_arn);
        let start = std::time::Instant::now();
        let output = sts
            .assume_role()
            .role_arn(&role_arn)
            .role_session_name(request.session_name())
            .duration_seconds(ASSUME_ROLE_DURATION_SECS)
            .send()
            .await
            .map_err(|e| {
                metrics::increment_aws_operation_errors("sts", "AssumeRole");
                AwsError::sdk(
                    "sts",
                    "AssumeRole",
                    aws_sdk_sts::error::DisplayErrorContext(&e).to_string(),
                )
            })?;
        metrics::record_aws_operation("sts", "AssumeRole", start.elapsed().as_secs_f64());

        let creds = output.credentials().ok_or(AwsError::MissingField {
            service: "sts",
            operation: "AssumeRole",
            field: "Credentials",
        })?;
        let credentials = Credentials::new(
            creds.access_key_id(),
            creds.secret_access_key(),
            Some(creds.session_token().to_string()),
            None,
            "harmonix-operations-role",
        );
        Ok(AwsAuthResponse {
            credentials,
            requester: request.user_name.clone(),
            owner: request.owner(),
            role_arn,
            account: request.account_id.clone(),
            region: request.region.clone(),
        })
    }
    .instrument(span)
    .await
}
