use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use perle_common::{Config, FileConfig};
use perle_publisher::{deps, scheduler, DailySchedule};

#[derive(Parser)]
#[command(name = "perle", about = "Publish classroom perle as short narrated videos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one publication cycle and exit
    Run,
    /// Run cycles at the scheduled daily times
    Serve {
        /// Also run one cycle right away
        #[arg(long)]
        now: bool,
    },
    /// Fetch the source and merge new items, without publishing
    Sync,
    /// Show store counts and the next unpublished items
    Status {
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("perle=info".parse()?);
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.log_redacted();
    let file = FileConfig::load_or_default(&config.config_path)?;

    match cli.command {
        Command::Run => {
            let workflow = deps::build_workflow(&config, &file)?;
            let report = workflow.run_cycle().await;
            if report.outcome.is_failure() {
                std::process::exit(1);
            }
        }
        Command::Serve { now } => {
            let schedule = DailySchedule::parse(&file.schedule.times)?;
            let workflow = deps::build_workflow(&config, &file)?;
            info!(times = ?schedule.times(), "Perle publisher serving");
            scheduler::serve(&workflow, &schedule, now).await;
        }
        Command::Sync => {
            let workflow = deps::build_workflow(&config, &file)?;
            let stats = workflow.sync().await?;
            println!("{stats}");
        }
        Command::Status { limit } => {
            let store = deps::build_store(&config);
            println!("{}", store.stats().await);
            let unpublished = store.unpublished_items().await;
            for item in unpublished.iter().rev().take(limit) {
                println!("  {}  {}", item.id, perle_common::text::truncate_chars(&item.text, 70));
            }
        }
    }

    Ok(())
}
