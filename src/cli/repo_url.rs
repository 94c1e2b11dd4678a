use anyhow::Result;
use harmonix_platform::scm::{util, GitProviders, RepositoryInfo};

pub fn repo_url_command(provider: &str, host: &str, org: Option<String>, repo: &str) -> Result<()> {
    let git_provider: GitProviders = provider.parse()?;
    let info = RepositoryInfo {
        git_host: host.to_string(),
        git_project_group: org.clone(),
        git_organization: org,
        git_repo_name: repo.to_string(),
        git_provider,
        ..Default::default()
    };
    println!("{}", util::get_repo_url(&info)?);
    Ok(())
}
