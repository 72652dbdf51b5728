use crate::demo::{run_demo, run_leaderboard, run_report, DemoArgs, LeaderboardArgs, ReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use mutabaah::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Mutabaah",
    about = "Track household worship logs, leaderboards and reports",
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
    /// Print the person x item x day pivot for a date range, optionally as CSV
    Report(ReportArgs),
    /// Rank household members for a window
    Leaderboard(LeaderboardArgs),
    /// Seed an in-memory household and walk through scoring, ranking and reporting
    Demo(DemoArgs),
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
        Command::Report(args) => run_report(args),
        Command::Leaderboard(args) => run_leaderboard(args),
        Command::Demo(args) => run_demo(args),
    }
}
