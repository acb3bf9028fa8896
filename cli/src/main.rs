mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    cmd_done, cmd_log, cmd_onboard, cmd_plan, cmd_profile, cmd_progress, cmd_tasks, cmd_templates,
};
use crate::config::Config;
use fitplan_core::service::FitService;

const SERVER_LOG_FILTER: &str = "fitplan=info,fitplan_core=info,tower_http=info";
const CLI_LOG_FILTER: &str = "warn";

#[derive(Parser)]
#[command(
    name = "fitplan",
    version,
    about = "Personalized daily fitness plans from a short questionnaire"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit onboarding answers and compute your profile
    Onboard {
        /// JSON file with questionnaire answers ("-" reads stdin)
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show your profile, metrics and daily targets
    Profile {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the plan for a date (defaults to today)
    Plan {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the task checklist for a date (defaults to today)
    Tasks {
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a task as completed
    Done {
        /// Task ID (see `fitplan tasks`)
        id: i64,
        /// Mark the task as not completed instead
        #[arg(long)]
        undo: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log weight, steps or water for a date
    Log {
        /// Date (YYYY-MM-DD or today/yesterday, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Body weight
        #[arg(short, long)]
        weight: Option<f64>,
        /// Weight unit: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Steps walked, added to the day's total
        #[arg(short, long)]
        steps: Option<u32>,
        /// Water drunk in ml, added to the day's total
        #[arg(long)]
        water: Option<u32>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show progress, weekly totals and streaks
    Progress {
        /// Number of days to show
        #[arg(short, long, default_value = "7")]
        days: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the meal and workout templates in use
    Templates {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

fn init_tracing(default_filter: &str) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json");

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(if matches!(cli.command, Commands::Serve { .. }) {
        SERVER_LOG_FILTER
    } else {
        CLI_LOG_FILTER
    });

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let svc = FitService::new(&config.db_path)?.with_templates(config.load_templates()?);
    let user = config.load_or_create_local_user(&svc)?;
    let user_id = user.id.as_str();

    match cli.command {
        Commands::Onboard { file, json } => cmd_onboard(&svc, user_id, &file, json),
        Commands::Profile { json } => cmd_profile(&svc, user_id, json),
        Commands::Plan { date, json } => cmd_plan(&svc, user_id, date, json),
        Commands::Tasks { date, json } => cmd_tasks(&svc, user_id, date, json),
        Commands::Done { id, undo, json } => cmd_done(&svc, user_id, id, undo, json),
        Commands::Log {
            date,
            weight,
            unit,
            steps,
            water,
            json,
        } => cmd_log(&svc, user_id, date, weight, &unit, steps, water, json),
        Commands::Progress { days, json } => cmd_progress(&svc, user_id, days, json),
        Commands::Templates { json } => cmd_templates(&svc, json),
        Commands::Serve { port, bind } => {
            server::start_server(svc, port, &bind, &user.token).await
        }
    }
}
