use crate::infra;
use crate::server;
use campus_market::config::AppConfig;
use campus_market::error::AppError;
use campus_market::listings::CleanupSummary;
use campus_market::telemetry;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Campus Marketplace",
    about = "Run the campus marketplace service and its maintenance tasks",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Run one listing cleanup sweep and print the summary
    Sweep,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Sweep => run_sweep().await,
    }
}

async fn run_sweep() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let sweep = infra::build_sweep(&config)?;
    let summary = sweep.run().await.map_err(AppError::from)?;

    println!("{}", render_summary(&summary)?);
    Ok(())
}

fn render_summary(summary: &CleanupSummary) -> Result<String, AppError> {
    serde_json::to_string_pretty(summary).map_err(|err| AppError::Io(err.into()))
}
