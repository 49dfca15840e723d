use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use critic::agent::{NullSink, ReviewAgent};
use critic::config::CriticConfig;
use critic::gateways::{GitHubGateway, OllamaGateway};
use critic::review::PullRequestRef;
use critic::server;

#[derive(Parser)]
#[command(name = "critic")]
#[command(version, about = "AI-powered pull request review service")]
pub struct Cli {
    /// Path to the config file (TOML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP service
    Serve {
        /// Port to listen on, overriding the config file
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Analyze one pull request inline and print the result as JSON
    Analyze {
        /// Repository in owner/name form
        repo: String,
        /// Pull request number
        number: u64,
        /// GitHub token for private repositories
        #[arg(long)]
        github_token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "critic=debug" } else { "critic=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = CriticConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            server::serve(config).await
        }
        Commands::Analyze {
            repo,
            number,
            github_token,
        } => analyze_inline(&config, &repo, number, github_token).await,
    }
}

/// One-shot analysis without the job machinery; useful for scripting and
/// smoke checks.
async fn analyze_inline(
    config: &CriticConfig,
    repo: &str,
    number: u64,
    github_token: Option<String>,
) -> Result<()> {
    let pr = PullRequestRef::parse(repo, number).map_err(|err| anyhow::anyhow!(err.message))?;
    let source = Arc::new(GitHubGateway::new(
        config.github.api_url.clone(),
        config.github.token.clone(),
    )?);
    let inference = Arc::new(OllamaGateway::new(
        config.ollama.base_url.clone(),
        config.ollama.model.clone(),
        config.ollama_timeout(),
    ));
    let agent = ReviewAgent::new(source, inference, Arc::new(NullSink)).with_token(github_token);
    let result = agent
        .execute(&pr)
        .await
        .map_err(|err| anyhow::anyhow!("analysis failed ({}): {}", err.kind, err.message))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
