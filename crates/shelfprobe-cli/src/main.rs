mod runner;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use shelfprobe_core::RunTarget;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shelfprobe-cli")]
#[command(about = "Survey retailer listing pages for prices and pack sizes")]
struct Cli {
    /// JSON file with selector overrides for the retailer
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Include each run's event log in the output
    #[arg(long, global = true)]
    events: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct TargetArgs {
    /// Short retailer identifier, e.g. `ah_nl`
    #[arg(long)]
    retailer: String,

    /// ISO 3166-1 alpha-2 country code
    #[arg(long)]
    country: String,

    /// Listing page to survey
    #[arg(long)]
    url: String,

    /// Reuse a run id instead of generating one
    #[arg(long)]
    run_id: Option<String>,
}

impl TargetArgs {
    fn to_target(&self) -> anyhow::Result<RunTarget> {
        let target = match &self.run_id {
            Some(run_id) => {
                RunTarget::with_run_id(run_id, &self.retailer, &self.country, &self.url)?
            }
            None => RunTarget::new(&self.retailer, &self.country, &self.url)?,
        };
        Ok(target)
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay saved page frames (`DIR/*.html`, in name order) as one run
    Replay {
        #[command(flatten)]
        target: TargetArgs,

        /// Directory holding the frames
        #[arg(long)]
        frames: PathBuf,
    },
    /// Fetch a static page over HTTP and run it
    Fetch {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Run every target in a JSON array file over HTTP
    Batch {
        #[arg(long)]
        targets: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = shelfprobe_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let profile = runner::load_profile(cli.profile.as_deref())?;

    let output = match cli.command {
        Commands::Replay { target, frames } => {
            let target = target.to_target()?;
            let report =
                runner::replay(&target, &frames, profile, config.run_bounds(), cli.events).await?;
            serde_json::to_string_pretty(&report)?
        }
        Commands::Fetch { target } => {
            let target = target.to_target()?;
            let report = runner::fetch(&target, profile, &config, cli.events).await?;
            serde_json::to_string_pretty(&report)?
        }
        Commands::Batch { targets } => {
            let reports = runner::batch(&targets, &profile, &config, cli.events).await?;
            serde_json::to_string_pretty(&reports)?
        }
    };
    println!("{output}");

    Ok(())
}
