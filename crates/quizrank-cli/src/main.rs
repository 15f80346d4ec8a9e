//! quizrank CLI: sync Canvas quiz submissions into dual ELO ratings.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "quizrank", version, about = "Canvas quiz sync with dual ELO ratings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync submissions and update ratings
    Sync {
        /// Sync a single course instead of all courses
        #[arg(long)]
        course: Option<String>,

        /// Ignore watermarks and re-read every submission
        #[arg(long)]
        full: bool,

        /// Print the sync summary as JSON
        #[arg(long)]
        json: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Sync all courses now and then periodically until interrupted
    Watch {
        /// Seconds between runs (default from config)
        #[arg(long)]
        interval_secs: Option<u64>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show per-course sync state
    Status {
        /// Limit to one course
        #[arg(long)]
        course: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the leaderboard of a course
    Ranking {
        #[arg(long)]
        course: String,

        /// Number of rows to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Suggest unsolved quizzes near a student's level
    Recommend {
        #[arg(long)]
        course: String,

        #[arg(long)]
        student: String,

        /// Only quizzes carrying this type tag
        #[arg(long)]
        tag: Option<String>,

        /// Number of suggestions
        #[arg(long, default_value = "3")]
        count: usize,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show a student's rating and attempt history in a course
    Student {
        #[arg(long)]
        course: String,

        #[arg(long)]
        student: String,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List rated quizzes, hardest first
    Problems {
        /// Limit to one course
        #[arg(long)]
        course: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the metadata parsed from a quiz title
    ParseTitle {
        /// Quiz title, e.g. "[READING][ART] Unit 3 <8.5> (9)"
        title: String,
    },

    /// Create a starter config file
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quizrank=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sync {
            course,
            full,
            json,
            config,
        } => commands::sync::execute(course, full, json, config).await,
        Commands::Watch {
            interval_secs,
            config,
        } => commands::watch::execute(interval_secs, config).await,
        Commands::Status { course, config } => commands::status::execute(course, config),
        Commands::Ranking {
            course,
            limit,
            config,
        } => commands::ranking::execute(course, limit, config),
        Commands::Recommend {
            course,
            student,
            tag,
            count,
            config,
        } => commands::recommend::execute(course, student, tag, count, config),
        Commands::Student {
            course,
            student,
            config,
        } => commands::student::execute(course, student, config),
        Commands::Problems { course, config } => commands::problems::execute(course, config),
        Commands::ParseTitle { title } => commands::parse_title::execute(&title),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
