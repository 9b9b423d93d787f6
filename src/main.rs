use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tracing::info;

mod config;
mod gitlab;
mod release;

use config::Config;
use gitlab::GitLabClient;
use release::{remote, ReleaseError, ReleaseWorkflow};

#[derive(Parser)]
#[command(name = "make-release")]
#[command(about = "Publish the latest deploy artifacts of a GitLab project as a new release")]
struct Cli {
    /// GitLab API token (can also be set via IGG_GITLAB_TOKEN env var)
    #[arg(long, env = "IGG_GITLAB_TOKEN", hide_env_values = true)]
    token: String,

    /// GitLab instance URL, overrides the config file
    #[arg(long, env = "GITLAB_URL")]
    gitlab_url: Option<String>,

    /// Project as namespace/project (resolved from the git remote if not specified)
    #[arg(short, long)]
    project: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Initialize logging; stdout is reserved for the interactive flow
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        println!("{}", diagnostic(&err));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let (config, client) = setup(&cli)?;
    publish(&client, &config, cli.project).await?;
    Ok(())
}

fn setup(cli: &Cli) -> Result<(Config, GitLabClient)> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.gitlab_url {
        config.gitlab.url = url.clone();
    }

    let client = GitLabClient::new(&config.gitlab.url, cli.token.clone())?;
    info!(gitlab = %config.gitlab.url, "Using GitLab instance");

    Ok((config, client))
}

/// Single-line `[ERROR]` message for a fatal failure: the error and its
/// causes, skipping causes the message already spells out.
fn diagnostic(err: &anyhow::Error) -> String {
    let mut message = String::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if message.is_empty() {
            message = text;
        } else if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
    }
    format!("[ERROR] {}", message)
}

async fn publish(
    client: &GitLabClient,
    config: &Config,
    project: Option<String>,
) -> Result<(), ReleaseError> {
    let project_path = match project {
        Some(path) => path,
        None => remote::resolve_project_path(&std::env::current_dir()?)?,
    };

    let workflow = ReleaseWorkflow::new(client, config)?;
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();

    let outcome = workflow.run(&project_path, &mut input, &mut out).await?;
    info!(
        tag = %outcome.tag_name,
        created = outcome.release.is_some(),
        releases = %outcome.releases_url,
        "Release workflow finished"
    );

    Ok(())
}
