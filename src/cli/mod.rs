//! # HARMONIXCTL CLI
//!
//! Command-line companion for the Harmonix platform backend.
//!
//! Runs the catalog processors and git utilities locally, without a portal
//! or AWS credentials.
//!
//! ## Usage
//!
//! ```bash
//! # Validate an entity descriptor and print the relations it produces
//! harmonixctl validate .backstage/catalog-info.yaml
//!
//! # Print the clone URL of a repository
//! harmonixctl repo-url --provider gitlab --host git.example.com --org platform --repo dev-env
//!
//! # Check environments and providers for dependency cycles
//! harmonixctl check-cycles envs/*.yaml
//!
//! # List scaffolder actions and their input schemas
//! harmonixctl actions --schemas
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod actions;
mod check_cycles;
mod repo_url;
mod validate;

/// Harmonix platform CLI
#[derive(Parser)]
#[command(name = "harmonixctl")]
#[command(
    about = "Harmonix platform CLI",
    long_about = None,
    after_help = "\
Examples:
  harmonixctl validate catalog-info.yaml
  harmonixctl repo-url --provider github --host github.com --org acme --repo orders
  harmonixctl check-cycles dev.yaml dev-ecs.yaml
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log format (json, text)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an entity descriptor with the catalog processors
    Validate {
        /// Entity descriptor (YAML or JSON)
        #[arg(value_name = "FILE")]
        file: std::path::PathBuf,
    },
    /// Print the clone URL of a repository
    RepoUrl {
        /// Git provider (gitlab, github)
        #[arg(long)]
        provider: String,
        /// Git host, e.g. git.example.com
        #[arg(long)]
        host: String,
        /// GitLab group or GitHub organization
        #[arg(long)]
        org: Option<String>,
        /// Repository name
        #[arg(long)]
        repo: String,
    },
    /// Build the dependency graph of several descriptors and report a cycle
    CheckCycles {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<std::path::PathBuf>,
    },
    /// List registered scaffolder actions
    Actions {
        /// Print each action's input schema
        #[arg(long)]
        schemas: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    harmonix_platform::observability::logging::init_tracing(&cli.log_format, true);

    match cli.command {
        Commands::Validate { file } => validate::validate_command(&file),
        Commands::RepoUrl {
            provider,
            host,
            org,
            repo,
        } => repo_url::repo_url_command(&provider, &host, org, &repo),
        Commands::CheckCycles { files } => check_cycles::check_cycles_command(&files),
        Commands::Actions { schemas } => actions::actions_command(schemas),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_repo_url_arguments() {
        let cli = Cli::try_parse_from([
            "harmonixctl",
            "repo-url",
            "--provider",
            "github",
            "--host",
            "github.com",
            "--repo",
            "dev-env",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::RepoUrl { ref provider, org: None, .. } if provider == "github"
        ));
    }
}
