mod commands;
mod context;
mod exit;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

use crate::context::Context;
use crate::exit::{Completion, Failure, code};

#[derive(Parser)]
#[command(
    name = "deckhand",
    about = "Build, tag, test, and deploy containerized services to AWS"
)]
#[command(version)]
struct Cli {
    /// AWS region to use
    #[arg(long, short = 'r', global = true)]
    region: Option<String>,

    /// AWS profile to use
    #[arg(long, short = 'p', global = true)]
    profile: Option<String>,

    /// Application environment (e.g. stage, prod)
    #[arg(long, short = 'e', global = true)]
    env: Option<String>,

    /// Config file, relative to the repository root [default: .deploy/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print debugging info to stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the service image
    Build(commands::BuildArgs),
    /// Push an image to ECR
    Push(commands::PushArgs),
    /// Tag an image for a lifecycle phase
    Tag(commands::TagArgs),
    /// Deploy the service stack with CloudFormation
    Deploy(commands::DeployArgs),
    /// Remove images created during a build
    Cleanup(commands::CleanupArgs),
    /// Run the service's tests in its image
    Test(commands::TestArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match run(cli).await {
        Ok(Completion::Done) => ExitCode::SUCCESS,
        Ok(completion) => ExitCode::from(completion.exit_code()),
        Err(failure) => failure.report(),
    }
}

/// `RUST_LOG` wins; otherwise `--debug` selects debug output and the
/// default is errors only.
fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "error" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

async fn run(cli: Cli) -> Result<Completion, Failure> {
    let Some(env) = cli.env.filter(|e| !e.is_empty()) else {
        return Err(Failure::new(
            code::MISSING_ENV,
            anyhow::anyhow!("you must provide an environment (--env)"),
        ));
    };

    let span = tracing::info_span!(
        "deckhand",
        app_env = %env,
        aws_profile = cli.profile.as_deref().unwrap_or_default(),
        aws_region = cli.region.as_deref().unwrap_or_default(),
    );

    async move {
        let ctx = Context::load(
            env,
            cli.region,
            cli.profile,
            cli.config.as_deref(),
            cli.debug,
        )
        .await?;

        match cli.command {
            Commands::Build(args) => commands::build(&ctx, args).await,
            Commands::Push(args) => commands::push(&ctx, args).await,
            Commands::Tag(args) => commands::tag(&ctx, args).await,
            Commands::Deploy(args) => commands::deploy(&ctx, args).await,
            Commands::Cleanup(args) => commands::cleanup(&ctx, args).await,
            Commands::Test(args) => commands::test(&ctx, args).await,
        }
    }
    .instrument(span)
    .await
}
