//! # Constants
//!
//! Shared constants used throughout the platform backend.
//!
//! These values represent defaults and conventions shared with the CI/CD
//! pipelines that consume the files committed by the platform workflows.
//! Values that can be overridden are read in [`crate::config::PlatformConfig`].

/// Default HTTP server port for the platform API, metrics and health checks
pub const DEFAULT_SERVER_PORT: u16 = 7007;

/// Default Backstage catalog REST endpoint
pub const DEFAULT_CATALOG_BASE_URL: &str = "http://localhost:7007/api/catalog";

/// Default GitHub REST API endpoint
pub const DEFAULT_GITHUB_API_BASE_URL: &str = "https://api.github.com";

/// Default scheme used when building GitLab API URLs from a repository host
pub const DEFAULT_GITLAB_API_SCHEME: &str = "https";

/// Secrets Manager secret holding the platform's GitLab admin token
pub const GITLAB_CREDENTIALS_SECRET: &str = "opa-admin-gitlab-secrets";

/// Secrets Manager secret holding the platform's GitHub admin token
pub const GITHUB_CREDENTIALS_SECRET: &str = "opa-admin-github-secrets";

/// JSON field of the git credentials secret that carries the API token
pub const GIT_TOKEN_SECRET_FIELD: &str = "apiToken";

/// Branch targeted by every workflow commit
pub const DEFAULT_BRANCH: &str = "main";

/// `apiVersion` of the custom catalog entity kinds
pub const AWS_API_VERSION: &str = "aws.backstage.io/v1alpha";

/// Catalog kind of an AWS environment
pub const AWS_ENVIRONMENT_KIND: &str = "AWSEnvironment";

/// Catalog kind of an AWS environment provider
pub const AWS_ENVIRONMENT_PROVIDER_KIND: &str = "AWSEnvironmentProvider";

/// Default entity namespace when a reference does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Annotation pointing at the Location entity that registered an entity
pub const MANAGED_BY_LOCATION_ANNOTATION: &str = "backstage.io/managed-by-location";

/// Annotation carrying the GitLab instance host
pub const GITLAB_INSTANCE_ANNOTATION: &str = "gitlab.com/instance";

/// Annotation carrying the GitLab `group/repo` slug
pub const GITLAB_PROJECT_SLUG_ANNOTATION: &str = "gitlab.com/project-slug";

/// Annotation carrying the GitHub `org/repo` slug
pub const GITHUB_PROJECT_SLUG_ANNOTATION: &str = "github.com/project-slug";

/// Host used for repositories hosted on github.com
pub const GITHUB_HOST: &str = "github.com";

/// Directory holding the per-provider deployment parameter files
pub const PROVIDER_PROPERTIES_DIR: &str = ".awsdeployment/providers";

/// Parameter file picked up by the resource binding pipeline job
pub const RESOURCE_BINDING_PARAMS_FILE: &str = ".awsdeployment/resource-binding-params-temp.properties";

/// Parameter file picked up by the Terraform destroy pipeline job
pub const ENV_DESTROY_PARAMS_FILE: &str = "env-destroy-params-temp.properties";

/// Directory holding IAM policy documents for bound resources
pub const PERMISSIONS_DIR: &str = ".iac/permissions";

/// Catalog descriptor rewritten when providers are attached or detached
pub const CATALOG_INFO_FILE: &str = ".backstage/catalog-info.yaml";

/// Message returned by GitLab when a commit tries to create an existing file
pub const FILE_ALREADY_EXISTS_MARKER: &str = "A file with this name already exists";

/// Suffix appended to every "scheduled" workflow message
pub const PIPELINE_FOLLOW_UP: &str = "Check the CICD pipeline for the most up-to-date information. UI status may take a few minutes to update.";

/// Secret ARN returned by the create-secret action in dry-run mode
pub const DRY_RUN_SECRET_ARN: &str = "arn:aws:secretsmanager:us-east-1:123456789123:secret:my-secret";

/// Region returned by the platform metadata action in dry-run mode
pub const DRY_RUN_PLATFORM_REGION: &str = "us-east-1";

/// Replica region added to every secret created by the platform
pub const SECRET_REPLICA_REGION: &str = "us-west-2";

/// Default description for secrets created from templates
pub const DEFAULT_SECRET_DESCRIPTION: &str = "Secret created from Backstage scaffolder action";

/// Lifetime of GitLab project access tokens (days)
pub const REPO_ACCESS_TOKEN_LIFETIME_DAYS: i64 = 364;

/// GitLab `Maintainer` access level
pub const GITLAB_MAINTAINER_ACCESS_LEVEL: u32 = 40;

/// Duration of assumed operations-role sessions (seconds)
pub const ASSUME_ROLE_DURATION_SECS: i32 = 3600;

/// Origin written into audit records
pub const AUDIT_ORIGIN: &str = "Backstage-SDK";

/// User name used when an action runs without a portal user
pub const AUTOMATION_USER: &str = "automation";
