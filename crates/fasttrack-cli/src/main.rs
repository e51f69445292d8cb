//! FastTrack CLI - Command-line interface for FastTrack
//!
//! Scans a project for AI-generated code, reports on it and serves the
//! tracking graph to the dashboard.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "fasttrack")]
#[command(author = "FastTrack Contributors")]
#[command(version)]
#[command(about = "Track AI-generated code, its tests and its age", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize FastTrack in a project
    Init {
        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Scan the project for AI-generated blocks and link tests
    Scan {
        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Show graph statistics and the dashboard summary
    Status {
        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List code blocks with no linked test
    Untested {
        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List AI-generated blocks untouched for a number of days
    Stale {
        /// Age in days (defaults to staleCode.days from settings)
        #[arg(short, long)]
        days: Option<u32>,

        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Rank files by number of AI-generated blocks
    Hotspots {
        /// Maximum files to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// List blocks at or above a complexity threshold
    Complexity {
        /// Threshold (defaults to complexity.threshold from settings)
        #[arg(short, long)]
        threshold: Option<u32>,

        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Tag a line range of a file as AI-generated
    Tag {
        /// File containing the block
        file: PathBuf,

        /// First line (1-based)
        start: u32,

        /// Last line (1-based, inclusive)
        end: u32,

        /// AI tool that produced the block
        #[arg(short, long)]
        tool: Option<String>,

        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Export the graph document as JSON
    Export {
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Start the dashboard server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7432")]
        port: u16,

        /// Also watch the project and push updates to clients
        #[arg(long)]
        watch: bool,

        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Watch the project and keep the graph up to date
    Watch {
        /// Project path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Scan { path } => commands::scan(&path),
        Commands::Status { path } => commands::status(&path),
        Commands::Untested { path } => commands::untested(&path),
        Commands::Stale { days, path } => commands::stale(&path, days),
        Commands::Hotspots { limit, path } => commands::hotspots(&path, limit),
        Commands::Complexity { threshold, path } => commands::complexity(&path, threshold),
        Commands::Tag {
            file,
            start,
            end,
            tool,
            path,
        } => commands::tag(&path, &file, start, end, tool),
        Commands::Export { output, path } => commands::export(&path, output.as_deref()),
        Commands::Serve { port, watch, path } => commands::serve(&path, port, watch).await,
        Commands::Watch { path } => commands::watch(&path).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
