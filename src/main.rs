mod config;
mod http;
mod jira;
mod patch;
mod pipeline;
mod pr;

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::pr::diff::ExclusionSet;

/// Patch Generator — builds a git patch and a composer patch for a Jira
/// ticket from the GitHub pull requests linked to it.
#[derive(Parser, Debug)]
#[command(name = "patch-generator", version, about)]
struct Cli {
    /// Jira ticket ID (e.g., ABC-123)
    ticket_id: String,

    /// Patch version suffix; "1" and an empty value mean no suffix
    #[arg(short = 'v', long, default_value = "")]
    patch_version: String,

    /// GitHub pull request URLs, separated by commas or whitespace.
    ///
    /// When omitted, the URLs are read from the ticket's pull request field.
    #[arg(short = 'g', long = "git-pr")]
    git_prs: Option<String>,

    /// Comma-separated path substrings to drop from the patch (overrides EXCLUDED_PATHS)
    #[arg(short, long)]
    exclude: Option<String>,

    /// Keep every file, including excluded paths such as tests
    #[arg(long)]
    with_tests: bool,

    /// Directory the patch files are written to
    #[arg(short = 'C', long, default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    info!("loading configuration");
    let config = config::Config::load()?;

    let client = http::build_client(config.http_timeout)?;
    let tracker = jira::JiraClient::new(client.clone(), config.jira.clone());
    let source = pr::GitHubClient::new(client, config.github_token.clone());
    let converter = patch::CommandConverter::new(&config.converter_command, config.converter_timeout)?;

    let exclusions = match cli.exclude.as_deref() {
        Some(csv) => ExclusionSet::parse(csv),
        None => config.excluded_paths.clone(),
    };
    debug!(exclusions = ?exclusions.as_slice(), with_tests = cli.with_tests, "resolved path filter");

    let options = pipeline::RunOptions {
        ticket_id: cli.ticket_id,
        pull_requests: cli.git_prs,
        patch_version: cli.patch_version,
        exclusions,
        include_everything: cli.with_tests,
        output_dir: cli.output_dir,
    };

    let output = pipeline::PatchGenerator::new(&options, &tracker, &source, &converter)
        .generate()
        .await?;

    println!("Patch file created: {}", output.git.display().to_string().green());
    println!("Patch file created: {}", output.composer.display().to_string().green());

    Ok(())
}
