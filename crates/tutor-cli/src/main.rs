//! tutor - streamed reading, grammar, and vocabulary analysis in the terminal

mod commands;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use tutor_core::{Level, Section};

#[derive(Debug, Parser)]
#[command(name = "tutor", version, about = "Streamed English reading, grammar, and vocabulary analysis")]
struct Cli {
    /// Comprehension level, 1 (easiest) to 5
    #[arg(short, long, global = true)]
    level: Option<Level>,

    /// Backend base URL (overrides config and TUTOR_BACKEND_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Debug logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Analyze a passage (from the argument, --file, or stdin)
    Analyze {
        text: Option<String>,
        #[arg(long, conflicts_with = "text")]
        file: Option<PathBuf>,
        /// Print this section live as it streams
        #[arg(long)]
        follow: Option<FollowSection>,
    },
    /// Analyze the text in an image (jpeg, png, webp)
    Image {
        path: PathBuf,
        #[arg(long)]
        follow: Option<FollowSection>,
    },
    /// Ask a follow-up question in the current session
    Chat { question: String },
    /// Show the cached session id
    Session {
        /// Start a new session
        #[arg(long)]
        reset: bool,
    },
    /// Show or store the preferred level
    Level { level: Option<Level> },
    /// Check that the backend is reachable
    Health,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FollowSection {
    Reading,
    Grammar,
    Vocabulary,
}

impl From<FollowSection> for Section {
    fn from(section: FollowSection) -> Self {
        match section {
            FollowSection::Reading => Section::Reading,
            FollowSection::Grammar => Section::Grammar,
            FollowSection::Vocabulary => Section::Vocabulary,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "tutor=debug,tutor_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match commands::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
