//! # Git Service Selector
//!
//! Resolves a [`GitProviders`] value to a concrete [`ScmBackendApi`] adapter.
//!
//! A [`GitService`] is a plain value: it starts unbound (provider `Unset`,
//! delegate [`GitUnset`]) and becomes bound through
//! [`GitService::set_git_provider`]. Requests build their own selector from
//! a shared [`GitServiceFactory`], so no delegate is ever swapped under a
//! concurrent reader.

use std::sync::Arc;
use tracing::info;

use super::{GitHubApi, GitLabApi, GitProviders, GitUnset, ScmBackendApi};

/// Endpoint overrides applied to the adapters a selector creates
#[derive(Debug, Clone, Default)]
pub struct ScmEndpoints {
    /// Replaces `https://api.github.com` and enterprise hosts
    pub github_api_base_url: Option<String>,
    /// Scheme used to reach GitLab hosts (`https` unless overridden)
    pub gitlab_api_scheme: Option<String>,
    /// Full GitLab API URL, for instances served under a path prefix
    pub gitlab_api_base_url: Option<String>,
}

/// Build the adapter for `provider`
///
/// The match is exhaustive: adding a provider variant fails to compile until
/// it is given an adapter here.
#[must_use]
pub fn create_adapter(
    provider: GitProviders,
    client: &reqwest::Client,
    endpoints: &ScmEndpoints,
) -> Arc<dyn ScmBackendApi> {
    match provider {
        GitProviders::GitLab => {
            let mut api = GitLabApi::new(client.clone());
            if let Some(scheme) = &endpoints.gitlab_api_scheme {
                api = api.with_scheme(scheme.clone());
            }
            if let Some(base_url) = &endpoints.gitlab_api_base_url {
                api = api.with_base_url(base_url.clone());
            }
            Arc::new(api)
        }
        GitProviders::GitHub => {
            let api = GitHubApi::new(client.clone());
            match &endpoints.github_api_base_url {
                Some(base_url) => Arc::new(api.with_base_url(base_url.clone())),
                None => Arc::new(api),
            }
        }
        GitProviders::Unset => Arc::new(GitUnset),
    }
}

/// Per-request git provider selector
#[derive(Debug, Clone)]
pub struct GitService {
    provider: GitProviders,
    git: Arc<dyn ScmBackendApi>,
    client: reqwest::Client,
    endpoints: ScmEndpoints,
}

impl Default for GitService {
    fn default() -> Self {
        Self::new()
    }
}

impl GitService {
    /// Unbound selector; every operation fails until a provider is set
    #[must_use]
    pub fn new() -> Self {
        Self::with_endpoints(reqwest::Client::new(), ScmEndpoints::default())
    }

    #[must_use]
    pub fn with_endpoints(client: reqwest::Client, endpoints: ScmEndpoints) -> Self {
        Self {
            provider: GitProviders::Unset,
            git: Arc::new(GitUnset),
            client,
            endpoints,
        }
    }

    /// Selector already bound to `provider`
    #[must_use]
    pub fn for_provider(provider: GitProviders) -> Self {
        let mut service = Self::new();
        service.set_git_provider(provider);
        service
    }

    /// Replace the delegate with a fresh adapter for `provider`
    pub fn set_git_provider(&mut self, provider: GitProviders) {
        info!("Instantiating git adapter for {}", provider);
        self.git = create_adapter(provider, &self.client, &self.endpoints);
        self.provider = provider;
    }

    /// Bind an externally constructed adapter
    pub fn set_git_provider_impl(&mut self, git: Arc<dyn ScmBackendApi>) {
        self.provider = git.provider();
        self.git = git;
    }

    /// The active adapter
    #[must_use]
    pub fn git_provider(&self) -> Arc<dyn ScmBackendApi> {
        Arc::clone(&self.git)
    }

    #[must_use]
    pub fn provider(&self) -> GitProviders {
        self.provider
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.provider != GitProviders::Unset
    }
}

/// Shared source of per-request [`GitService`] values
#[derive(Debug, Clone)]
pub struct GitServiceFactory {
    provider: GitProviders,
    client: reqwest::Client,
    endpoints: ScmEndpoints,
    adapter_override: Option<Arc<dyn ScmBackendApi>>,
}

impl GitServiceFactory {
    #[must_use]
    pub fn new(provider: GitProviders, client: reqwest::Client, endpoints: ScmEndpoints) -> Self {
        Self {
            provider,
            client,
            endpoints,
            adapter_override: None,
        }
    }

    /// Factory handing out selectors bound to `adapter`
    #[must_use]
    pub fn from_adapter(adapter: Arc<dyn ScmBackendApi>) -> Self {
        Self {
            provider: adapter.provider(),
            client: reqwest::Client::new(),
            endpoints: ScmEndpoints::default(),
            adapter_override: Some(adapter),
        }
    }

    #[must_use]
    pub fn provider(&self) -> GitProviders {
        self.provider
    }

    /// A new selector bound to the configured provider
    #[must_use]
    pub fn service(&self) -> GitService {
        let mut service = GitService::with_endpoints(self.client.clone(), self.endpoints.clone());
        match &self.adapter_override {
            Some(adapter) => service.set_git_provider_impl(Arc::clone(adapter)),
            None => service.set_git_provider(self.provider),
        }
        service
    }
}
