use crate::report::{
    run_batch, run_determine, run_schedules, BatchArgs, DetermineArgs, SchedulesArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use rating_engine::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Rating Determination Engine",
    about = "Select supported disability ratings and evidence gaps from clinical metrics",
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
    /// Determine the supported rating for one diagnostic code
    Determine(DetermineArgs),
    /// Rate every request in an evidence CSV export
    Batch(BatchArgs),
    /// List the registered rating schedules
    Schedules(SchedulesArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Load rating schedules from a JSON file instead of the embedded set
    #[arg(long)]
    pub(crate) schedules: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Determine(args) => run_determine(args),
        Command::Batch(args) => run_batch(args),
        Command::Schedules(args) => run_schedules(args),
    }
}
