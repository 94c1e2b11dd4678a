//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use harmonix_platform::prelude::*;
//! ```
//!
//! This brings into scope:
//! - SCM types and the adapter trait (ScmBackendApi, GitService, RepositoryInfo, etc.)
//! - AWS facade traits (AwsSdkService, AwsClientFactory)
//! - Catalog types (Entity, CatalogApi, processors)
//! - Platform workflow types (PlatformService, WorkflowStatus, etc.)
//! - Scaffolder action types
//! - Error types

// SCM adapters and selector
pub use crate::scm::{
    CommitAction, CommitChange, GitApiResult, GitProviders, GitService, GitServiceFactory,
    RepositoryInfo, ScmBackendApi,
};

// AWS facade
pub use crate::aws::{AwsAuthRequest, AwsClientFactory, AwsSdkService, OperationsSession};

// Catalog
pub use crate::catalog::{
    AwsEnvironmentEntitiesProcessor, AwsEnvironmentProviderEntitiesProcessor, CatalogApi,
    CatalogProcessor, Entity,
};

// Platform workflows
pub use crate::platform::{PlatformService, Requester, WorkflowState, WorkflowStatus};

// Scaffolder actions
pub use crate::actions::{ActionContext, ActionRegistry, TemplateAction};

// Config
pub use crate::config::PlatformConfig;

// Common error types
pub use crate::error::{ActionError, AwsError, CatalogError, ConfigError, GitError, PlatformError};
