//! `lightboxctl`: inspect preload windows and configuration, or walk a
//! gallery over HTTP and watch the cache behave.

mod commands;
mod view;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use env_logger::{Builder, Target};
use lightbox_model::{Direction, Navigation};
use log::LevelFilter;

#[derive(Parser)]
#[command(
    name = "lightboxctl",
    version,
    about = "Lightbox viewer core: preload planning, config inspection and gallery walks"
)]
struct Cli {
    /// Config file to use instead of the environment and default files
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the preload window around an index
    Plan(PlanArgs),
    /// Print the effective viewer configuration and where it came from
    Config {
        /// Emit JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
    /// Open a gallery from a JSON file and navigate it over HTTP
    Walk(WalkArgs),
}

#[derive(Args)]
struct PlanArgs {
    /// Number of items in the gallery
    #[arg(long)]
    count: usize,
    /// Index of the shown item
    #[arg(long, default_value_t = 0)]
    center: usize,
    /// Explicit radius; derived from --streak and the config when omitted
    #[arg(long, conflicts_with = "streak")]
    radius: Option<usize>,
    /// Navigation streak level used to derive the radius
    #[arg(long, default_value_t = 0)]
    streak: u32,
}

#[derive(Args)]
struct WalkArgs {
    /// JSON array of items: {"url", "title", "type", "size"?, "thumbnail"?}
    #[arg(long)]
    items: PathBuf,
    /// Index to open at (clamped into range)
    #[arg(long, default_value_t = 0)]
    start: usize,
    /// Comma separated moves: next, prev, or an index to jump to
    #[arg(long, value_delimiter = ',', value_parser = parse_move)]
    moves: Vec<Navigation>,
    /// Override the cache budget (MiB)
    #[arg(long)]
    budget_mib: Option<u64>,
    /// Wait for background preloads after every move
    #[arg(long)]
    settle: bool,
}

fn parse_move(raw: &str) -> Result<Navigation, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "next" | "n" | "right" => Ok(Navigation::Step(Direction::Forward)),
        "prev" | "p" | "left" => Ok(Navigation::Step(Direction::Backward)),
        other => other
            .parse::<usize>()
            .map(Navigation::Jump)
            .map_err(|_| format!("unknown move '{raw}', expected next, prev or an index")),
    }
}

fn init_logger() {
    Builder::new()
        .target(Target::Stderr)
        .filter_level(LevelFilter::Warn)
        .filter_module("lightbox_core", LevelFilter::Info)
        .filter_module("lightbox_config", LevelFilter::Info)
        .filter_module("lightboxctl", LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        init_logger();
    } else {
        env_logger::init();
    }

    let cli = Cli::parse();
    let loaded = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Plan(args) => commands::plan(&loaded.config, &args),
        Command::Config { json } => commands::show_config(&loaded, json),
        Command::Walk(args) => commands::walk(loaded.config, args).await,
    }
}
