use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "timebank", version, about = "Timebank screen-time economy CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile elapsed time and print the current state as JSON
    Status,
    /// Add (or with a negative value, remove) seconds of balance
    Credit {
        #[arg(allow_negative_numbers = true)]
        seconds: i64,
    },
    /// Record a quiz answer
    Answer(commands::economy::AnswerArgs),
    /// Report that the host app moved to the background
    Background,
    /// Report that the host app returned to the foreground
    Foreground,
    /// Run one overtime penalty check
    Penalty,
    /// Erase balance, scores and history
    Erase,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the engine loop, reading input lines from stdin
    Run,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("TIMEBANK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Status => commands::economy::status(),
        Commands::Credit { seconds } => commands::economy::credit(seconds),
        Commands::Answer(args) => commands::economy::answer(args),
        Commands::Background => commands::economy::background(),
        Commands::Foreground => commands::economy::foreground(),
        Commands::Penalty => commands::economy::penalty(),
        Commands::Erase => commands::economy::erase(),
        Commands::Config { action } => commands::config::run(action),
        Commands::Run => commands::run::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
