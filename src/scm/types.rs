//! # SCM Types
//!
//! Provider-independent description of repositories, commits and API results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GitError;

/// Git hosting providers known to the platform
///
/// `Unset` is the state of an unconfigured selector. Every operation routed
/// to it fails with [`GitError::Unset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProviders {
    GitLab,
    GitHub,
    #[default]
    Unset,
}

impl GitProviders {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GitProviders::GitLab => "gitlab",
            GitProviders::GitHub => "github",
            GitProviders::Unset => "unset",
        }
    }
}

impl fmt::Display for GitProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GitProviders {
    type Err = GitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gitlab" => Ok(GitProviders::GitLab),
            "github" => Ok(GitProviders::GitHub),
            "unset" => Ok(GitProviders::Unset),
            other => Err(GitError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Repository visibility requested at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitVisibility {
    #[default]
    Private,
    Public,
}

impl GitVisibility {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            GitVisibility::Private => "private",
            GitVisibility::Public => "public",
        }
    }
}

/// Identifies a repository on a git host
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_identifier: Option<String>,
    pub git_host: String,
    /// GitLab group owning the project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_project_group: Option<String>,
    /// GitHub organization owning the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_organization: Option<String>,
    pub git_repo_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_job_id: Option<String>,
    /// Numeric GitLab project id, resolved lazily when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<GitVisibility>,
    pub git_provider: GitProviders,
}

impl RepositoryInfo {
    /// Repository name without any `owner/` prefix
    #[must_use]
    pub fn repo_name(&self) -> &str {
        self.git_repo_name
            .rsplit_once('/')
            .map_or(self.git_repo_name.as_str(), |(_, name)| name)
    }

    /// Requested visibility, falling back to `is_private`
    #[must_use]
    pub fn effective_visibility(&self) -> GitVisibility {
        self.visibility.unwrap_or(if self.is_private {
            GitVisibility::Private
        } else {
            GitVisibility::Public
        })
    }

    /// `group/repo` or `org/repo`, depending on the provider
    #[must_use]
    pub fn full_path(&self) -> String {
        let owner = match self.git_provider {
            GitProviders::GitLab => self.git_project_group.as_deref(),
            GitProviders::GitHub => self.git_organization.as_deref(),
            GitProviders::Unset => None,
        };
        match owner {
            Some(owner) if !owner.is_empty() => format!("{owner}/{}", self.repo_name()),
            _ => self.repo_name().to_string(),
        }
    }
}

/// Kind of change applied to a single file in a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitActionKind {
    Create,
    Update,
    Delete,
}

impl CommitActionKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitActionKind::Create => "create",
            CommitActionKind::Update => "update",
            CommitActionKind::Delete => "delete",
        }
    }
}

/// One file change inside a [`CommitChange`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAction {
    pub action: CommitActionKind,
    pub file_path: String,
    pub content: String,
}

impl CommitAction {
    pub fn create(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: CommitActionKind::Create,
            file_path: file_path.into(),
            content: content.into(),
        }
    }

    pub fn update(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: CommitActionKind::Update,
            file_path: file_path.into(),
            content: content.into(),
        }
    }

    pub fn delete(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            action: CommitActionKind::Delete,
            file_path: file_path.into(),
            content: content.into(),
        }
    }
}

/// Ordered set of file actions committed to one branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitChange {
    pub actions: Vec<CommitAction>,
    pub branch: String,
    pub commit_message: String,
}

impl CommitChange {
    /// Reject commits without file actions before any request is made
    pub fn ensure_not_empty(&self) -> Result<(), GitError> {
        if self.actions.is_empty() {
            return Err(GitError::EmptyCommit {
                branch: self.branch.clone(),
            });
        }
        Ok(())
    }
}

/// Successful outcome of an SCM operation
///
/// Failures are reported through [`GitError`]; a `GitApiResult` always
/// describes a call the provider accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitApiResult {
    pub message: String,
    pub http_response: u16,
    /// Provider response payload (created project, decoded file content, commit)
    pub value: serde_json::Value,
}

impl GitApiResult {
    pub fn new(message: impl Into<String>, http_response: u16, value: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            http_response,
            value,
        }
    }

    /// `value` as a string, for file content results
    #[must_use]
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_providers_parse_case_insensitive() {
        assert_eq!("GitLab".parse::<GitProviders>().unwrap(), GitProviders::GitLab);
        assert_eq!(" github ".parse::<GitProviders>().unwrap(), GitProviders::GitHub);
        assert_eq!("unset".parse::<GitProviders>().unwrap(), GitProviders::Unset);
        assert!("bitbucket".parse::<GitProviders>().is_err());
    }

    #[test]
    fn test_git_providers_serde_names() {
        let json = serde_json::to_string(&GitProviders::GitLab).unwrap();
        assert_eq!(json, "\"gitlab\"");
        let parsed: GitProviders = serde_json::from_str("\"github\"").unwrap();
        assert_eq!(parsed, GitProviders::GitHub);
    }

    #[test]
    fn test_full_path_uses_owner_for_provider() {
        let repo = RepositoryInfo {
            git_host: "git.example.com".to_string(),
            git_project_group: Some("platform".to_string()),
            git_organization: Some("ignored".to_string()),
            git_repo_name: "platform/dev-env".to_string(),
            git_provider: GitProviders::GitLab,
            ..Default::default()
        };
        assert_eq!(repo.repo_name(), "dev-env");
        assert_eq!(repo.full_path(), "platform/dev-env");
    }

    #[test]
    fn test_empty_commit_is_rejected() {
        let change = CommitChange {
            actions: vec![],
            branch: "main".to_string(),
            commit_message: "nothing".to_string(),
        };
        let err = change.ensure_not_empty().unwrap_err();
        assert!(matches!(err, GitError::EmptyCommit { .. }));
    }
}
