//! ARN parsing.

use std::fmt;
use std::str::FromStr;

use crate::error::AwsError;

/// `arn:partition:service:region:account-id:resource`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    /// Everything after the account id, colons included
    pub resource: String,
}

impl FromStr for Arn {
    type Err = AwsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| AwsError::InvalidArn {
            arn: s.to_string(),
            reason: reason.to_string(),
        };
        let mut parts = s.splitn(6, ':');
        if parts.next() != Some("arn") {
            return Err(invalid("must start with 'arn:'"));
        }
        let (Some(partition), Some(service), Some(region), Some(account_id), Some(resource)) = (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) else {
            return Err(invalid("expected six ':'-separated fields"));
        };
        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(invalid("partition, service and resource must not be empty"));
        }
        Ok(Arn {
            partition: partition.to_string(),
            service: service.to_string(),
            region: region.to_string(),
            account_id: account_id.to_string(),
            resource: resource.to_string(),
        })
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// Whether `s` is a well-formed ARN
#[must_use]
pub fn is_valid_arn(s: &str) -> bool {
    s.parse::<Arn>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_secret_arn() {
        let arn: Arn = "arn:aws:secretsmanager:us-east-1:123456789123:secret:my-secret"
            .parse()
            .unwrap();
        assert_eq!(arn.service, "secretsmanager");
        assert_eq!(arn.region, "us-east-1");
        assert_eq!(arn.account_id, "123456789123");
        assert_eq!(arn.resource, "secret:my-secret");
        assert_eq!(
            arn.to_string(),
            "arn:aws:secretsmanager:us-east-1:123456789123:secret:my-secret"
        );
    }

    #[test]
    fn test_iam_arn_has_empty_region() {
        let arn: Arn = "arn:aws:iam::123456789012:role/dev-ops-role".parse().unwrap();
        assert!(arn.region.is_empty());
        assert_eq!(arn.resource, "role/dev-ops-role");
    }

    #[test]
    fn test_invalid_arns() {
        assert!(!is_valid_arn("my-secret"));
        assert!(!is_valid_arn("arn:aws:secretsmanager:us-east-1"));
        assert!(!is_valid_arn("urn:aws:s3:::bucket"));
    }
}
