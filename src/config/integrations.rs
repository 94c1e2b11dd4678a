use zeroize::Zeroizing;

use super::env_var_opt;

/// Credentials for one GitLab host
#[derive(Clone)]
pub struct GitLabIntegration {
    pub host: String,
    pub token: Option<Zeroizing<String>>,
    /// Defaults to `https://{host}/api/v4`
    pub api_base_url: Option<String>,
}

impl std::fmt::Debug for GitLabIntegration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabIntegration")
            .field("host", &self.host)
            .field("api_base_url", &self.api_base_url)
            .field("has_token", &self.token.is_some())
            .finish()
    }
}

/// SCM integrations used by scaffolder actions
#[derive(Debug, Clone, Default)]
pub struct ScmIntegrations {
    pub gitlab: Vec<GitLabIntegration>,
}

impl ScmIntegrations {
    /// `GITLAB_HOST`, `GITLAB_TOKEN` and `GITLAB_API_BASE_URL`
    pub(crate) fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: &F) -> Self {
        let gitlab = env_var_opt(lookup, "GITLAB_HOST")
            .map(|host| GitLabIntegration {
                host,
                token: env_var_opt(lookup, "GITLAB_TOKEN").map(Zeroizing::new),
                api_base_url: env_var_opt(lookup, "GITLAB_API_BASE_URL"),
            })
            .into_iter()
            .collect();
        Self { gitlab }
    }

    #[must_use]
    pub fn gitlab_by_host(&self, host: &str) -> Option<&GitLabIntegration> {
        self.gitlab.iter().find(|i| i.host.eq_ignore_ascii_case(host))
    }
}
