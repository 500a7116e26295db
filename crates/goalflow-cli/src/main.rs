mod config;
mod plan_cmd;
#[cfg(test)]
mod test_util;

use clap::{Parser, Subcommand};

use goalflow_core::CommitmentLevel;
use goalflow_core::api::ApiConfig;
use goalflow_core::plan::StrategyKind;

use config::GoalflowConfig;
use plan_cmd::{OutputFormat, PlanArgs};

#[derive(Parser)]
#[command(name = "goalflow", about = "Turn personal goals into eight-week task timelines")]
struct Cli {
    /// Backend base URL (overrides GOALFLOW_API_URL env var)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a goalflow config file
    Init {
        /// Planning service endpoint used by the ai strategy
        #[arg(long)]
        planner_url: Option<String>,
        /// Strategy to store as the default
        #[arg(long, default_value = "synthesized")]
        strategy: StrategyKind,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Submit a goal and show its eight-week plan
    Plan {
        /// Goal title
        title: String,
        /// Commitment level: low, medium, high
        #[arg(long, default_value = "medium")]
        commitment: CommitmentLevel,
        /// Materialization strategy: synthesized, ai (overrides config)
        #[arg(long)]
        strategy: Option<StrategyKind>,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Output file path (defaults to stdout)
        #[arg(long)]
        output: Option<String>,
    },
    /// Show the resolved configuration
    Config,
}

/// Execute the `goalflow init` command: write config file.
fn cmd_init(
    api_url: Option<&str>,
    planner_url: Option<String>,
    strategy: StrategyKind,
    force: bool,
) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }
    if strategy == StrategyKind::Ai && planner_url.is_none() {
        anyhow::bail!("--strategy ai needs --planner-url");
    }

    let base_url = api_url.unwrap_or(ApiConfig::DEFAULT_URL).to_string();
    let cfg = config::ConfigFile {
        api: config::ApiSection {
            base_url: base_url.clone(),
            request_timeout_secs: ApiConfig::DEFAULT_TIMEOUT_SECS,
        },
        planner: config::PlannerSection {
            strategy,
            endpoint: planner_url,
            api_key: None,
        },
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  api.base_url = {base_url}");
    println!("  planner.strategy = {strategy}");
    if let Some(ref endpoint) = cfg.planner.endpoint {
        println!("  planner.endpoint = {endpoint}");
    }
    println!();
    println!("Next: run `goalflow plan \"<goal>\"` to generate a plan.");

    Ok(())
}

/// Execute the `goalflow config` command: print the resolved configuration.
fn cmd_config(api_url: Option<&str>) -> anyhow::Result<()> {
    let path = config::config_path();
    let resolved = GoalflowConfig::resolve(api_url, None)?;

    let state = if path.exists() { "found" } else { "not found" };
    println!("Config file: {} ({state})", path.display());
    println!("  api.base_url = {}", resolved.api.base_url);
    println!(
        "  api.request_timeout_secs = {}",
        resolved.api.request_timeout.as_secs()
    );
    println!("  planner.strategy = {}", resolved.strategy);
    match resolved.planner {
        Some(planner) => {
            println!("  planner.endpoint = {}", planner.endpoint);
            let key = planner
                .api_key
                .as_deref()
                .map(config::redact)
                .unwrap_or_else(|| "(unset)".to_string());
            println!("  planner.api_key = {key}");
        }
        None => println!("  planner.endpoint = (unset)"),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            planner_url,
            strategy,
            force,
        } => {
            cmd_init(cli.api_url.as_deref(), planner_url, strategy, force)?;
        }
        Commands::Plan {
            title,
            commitment,
            strategy,
            format,
            output,
        } => {
            let resolved = GoalflowConfig::resolve(cli.api_url.as_deref(), strategy)?;
            let args = PlanArgs {
                title,
                commitment,
                format,
                output,
            };
            plan_cmd::run_plan(&resolved, &args).await?;
        }
        Commands::Config => {
            cmd_config(cli.api_url.as_deref())?;
        }
    }

    Ok(())
}
