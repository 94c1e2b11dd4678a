//! # Errors
//!
//! Error types for each layer of the platform backend.
//!
//! Adapters, facades and workflows all return `Result<T, E>` with one of
//! these enums. Binaries wrap them in `anyhow` at the top level.

use thiserror::Error;

use crate::scm::GitProviders;

/// Errors raised by git provider adapters and the git utilities
#[derive(Debug, Error)]
pub enum GitError {
    /// The selector has no provider bound
    #[error("Unset Git Implementation")]
    Unset,

    #[error("Unsupported git provider {0}")]
    UnsupportedProvider(String),

    #[error("Commit to branch '{branch}' has no file actions")]
    EmptyCommit { branch: String },

    #[error("Repository info is missing {0}")]
    MissingRepositoryField(&'static str),

    #[error("Failed to get git project ID for group '{group}' and repo '{repo}'")]
    ProjectNotFound { group: String, repo: String },

    /// The provider answered with a non-2xx status
    #[error("{provider} {operation} failed with HTTP {status}: {message}")]
    Api {
        provider: GitProviders,
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("{provider} {operation} request failed: {source}")]
    Transport {
        provider: GitProviders,
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} {operation} returned an unexpected response: {message}")]
    InvalidResponse {
        provider: GitProviders,
        operation: &'static str,
        message: String,
    },
}

impl GitError {
    /// HTTP status reported by the provider, when there was one
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            GitError::Api { status, .. } => Some(*status),
            GitError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Provider message for API failures, the display text otherwise
    #[must_use]
    pub fn provider_message(&self) -> String {
        match self {
            GitError::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Errors raised by the AWS facade
#[derive(Debug, Error)]
pub enum AwsError {
    /// An SDK call was rejected or could not be sent
    #[error("AWS {service} {operation} failed: {message}")]
    Sdk {
        service: &'static str,
        operation: &'static str,
        message: String,
    },

    #[error("Invalid AWS account ID '{0}'")]
    InvalidAccount(String),

    #[error("Invalid AWS region '{0}'")]
    InvalidRegion(String),

    #[error("Invalid ARN '{arn}': {reason}")]
    InvalidArn { arn: String, reason: String },

    #[error("AWS {service} {operation} response is missing {field}")]
    MissingField {
        service: &'static str,
        operation: &'static str,
        field: &'static str,
    },

    #[error("Failed to build AWS {service} request: {message}")]
    Build {
        service: &'static str,
        message: String,
    },
}

impl AwsError {
    pub(crate) fn sdk(
        service: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        AwsError::Sdk {
            service,
            operation,
            message: message.into(),
        }
    }
}

/// Errors raised by the catalog model and catalog client
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Entity {0} not found in the catalog")]
    NotFound(String),

    #[error("Invalid entity reference '{reference}': {reason}")]
    InvalidRef { reference: String, reason: String },

    #[error("Catalog {operation} failed with HTTP {status}: {message}")]
    Api {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("Catalog {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse entity: {0}")]
    Parse(String),

    #[error("Entity {entity} is missing {field}")]
    MissingField { entity: String, field: String },

    #[error("Dependency cycle detected: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },
}

/// Errors raised by the platform workflows
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Aws(#[from] AwsError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Secret {0} does not contain an apiToken")]
    MissingGitToken(String),

    /// The pipeline input file already exists on the branch
    #[error("{0}")]
    AlreadyScheduled(String),

    #[error("Provider {provider} is still used by: {}", .environments.join(", "))]
    ProviderInUse {
        provider: String,
        environments: Vec<String>,
    },

    #[error("Invalid workflow input: {0}")]
    InvalidInput(String),

    #[error("Failed to serialize {what}: {message}")]
    Serialization { what: &'static str, message: String },

    /// A delete step failed after earlier steps already took effect
    #[error(
        "Provider deletion stopped at '{failed_step}' after completing [{}]: {source}",
        .completed_steps.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    PartialDelete {
        failed_step: crate::platform::DeleteStep,
        completed_steps: Vec<crate::platform::DeleteStep>,
        #[source]
        source: Box<PlatformError>,
    },
}

/// Errors raised by scaffolder actions
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("No action registered with id '{0}'")]
    UnknownAction(String),

    #[error("Invalid input for action {action}: {}", .errors.join("; "))]
    InvalidInput { action: String, errors: Vec<String> },

    #[error("Path '{0}' resolves outside the workspace")]
    PathOutsideWorkspace(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Aws(#[from] AwsError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("{0}")]
    Failed(String),
}

/// Startup configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("GIT_PROVIDER must be set to one of: gitlab, github")]
    GitProviderUnset,

    #[error("Unsupported GIT_PROVIDER value '{0}'")]
    UnsupportedGitProvider(String),

    #[error("Platform region is not configured; set PLATFORM_REGION or AWS_REGION")]
    MissingPlatformRegion,

    #[error("Invalid platform region '{0}'")]
    InvalidPlatformRegion(String),

    #[error("Invalid {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}
