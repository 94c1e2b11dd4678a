//! # Git Utilities
//!
//! Conversions between catalog entities, repository descriptors and clone URLs.

use crate::catalog::Entity;
use crate::constants::{
    GITHUB_CREDENTIALS_SECRET, GITHUB_HOST, GITHUB_PROJECT_SLUG_ANNOTATION,
    GITLAB_CREDENTIALS_SECRET, GITLAB_INSTANCE_ANNOTATION, GITLAB_PROJECT_SLUG_ANNOTATION,
};
use crate::error::GitError;

use super::{GitProviders, RepositoryInfo};

/// Clone URL of `repo` without scheme: `<host>/<org-or-group>/<repo>.git`
///
/// When the repository has no owner the URL is `<host>/<repo>.git`.
pub fn get_repo_url(repo: &RepositoryInfo) -> Result<String, GitError> {
    let owner = match repo.git_provider {
        GitProviders::GitLab => repo.git_project_group.as_deref(),
        GitProviders::GitHub => repo.git_organization.as_deref(),
        GitProviders::Unset => {
            return Err(GitError::UnsupportedProvider(repo.git_provider.to_string()))
        }
    };
    let name = repo.repo_name();
    Ok(match owner.filter(|o| !o.is_empty()) {
        Some(owner) => format!("{}/{owner}/{name}.git", repo.git_host),
        None => format!("{}/{name}.git", repo.git_host),
    })
}

/// Repository backing a catalog entity
///
/// The provider comes from `metadata.gitProvider` and defaults to GitLab.
/// GitLab repositories are located through the `gitlab.com/instance` and
/// `gitlab.com/project-slug` annotations, GitHub repositories through
/// `github.com/project-slug`.
pub fn get_repo_info(entity: &Entity) -> Result<RepositoryInfo, GitError> {
    let provider = match entity.metadata_str("gitProvider") {
        Some(value) => value.parse::<GitProviders>()?,
        None => GitProviders::GitLab,
    };
    let annotation = |key: &'static str| -> Result<String, GitError> {
        entity
            .metadata
            .annotations
            .get(key)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or(GitError::MissingRepositoryField(key))
    };

    match provider {
        GitProviders::GitLab => {
            let slug = annotation(GITLAB_PROJECT_SLUG_ANNOTATION)?;
            let (group, name) = split_slug(&slug);
            Ok(RepositoryInfo {
                git_host: annotation(GITLAB_INSTANCE_ANNOTATION)?,
                git_project_group: group,
                git_repo_name: name,
                is_private: true,
                git_provider: provider,
                ..Default::default()
            })
        }
        GitProviders::GitHub => {
            let slug = annotation(GITHUB_PROJECT_SLUG_ANNOTATION)?;
            let (org, name) = split_slug(&slug);
            Ok(RepositoryInfo {
                git_host: GITHUB_HOST.to_string(),
                git_organization: org,
                git_repo_name: name,
                is_private: true,
                git_provider: provider,
                ..Default::default()
            })
        }
        GitProviders::Unset => Err(GitError::UnsupportedProvider(provider.to_string())),
    }
}

/// `group/sub/repo` becomes (`group/sub`, `repo`)
fn split_slug(slug: &str) -> (Option<String>, String) {
    match slug.rsplit_once('/') {
        Some((owner, name)) => (Some(owner.to_string()), name.to_string()),
        None => (None, slug.to_string()),
    }
}

/// Secrets Manager secret holding the platform token for `provider`
pub fn get_git_credentials_secret(provider: GitProviders) -> Result<&'static str, GitError> {
    match provider {
        GitProviders::GitLab => Ok(GITLAB_CREDENTIALS_SECRET),
        GitProviders::GitHub => Ok(GITHUB_CREDENTIALS_SECRET),
        GitProviders::Unset => Err(GitError::UnsupportedProvider(provider.to_string())),
    }
}

/// Parts of a scaffolder `repoUrl` (`host?owner=group&repo=name`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoUrlParts {
    pub host: String,
    pub owner: Option<String>,
    pub repo: String,
}

/// Parse a scaffolder repository location such as
/// `gitlab.example.com?owner=platform&repo=dev-env`
pub fn parse_repo_url(repo_url: &str) -> Result<RepoUrlParts, GitError> {
    let url = reqwest::Url::parse(&format!("https://{}", repo_url.trim()))
        .map_err(|e| GitError::InvalidResponse {
            provider: GitProviders::Unset,
            operation: "parse_repo_url",
            message: format!("invalid repoUrl '{repo_url}': {e}"),
        })?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(GitError::MissingRepositoryField("repoUrl host"))?;
    let host = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };
    let mut owner = None;
    let mut repo = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "owner" | "group" | "organization" if owner.is_none() => owner = Some(value.into_owned()),
            "repo" => repo = Some(value.into_owned()),
            _ => {}
        }
    }
    Ok(RepoUrlParts {
        host,
        owner,
        repo: repo
            .filter(|r| !r.is_empty())
            .ok_or(GitError::MissingRepositoryField("repoUrl repo"))?,
    })
}
