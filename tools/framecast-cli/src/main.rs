//! framecast CLI: export frame ranges with throttled progress.
//!
//! Usage:
//!   framecast export --end <FRAME> [OPTIONS]   Export a frame range
//!   framecast check                            Check encoder availability
//!   framecast config [--init]                  Show the resolved configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use framecast_common::config::AppConfig;
use framecast_model::ExportType;

mod commands;

#[derive(Parser)]
#[command(
    name = "framecast",
    about = "Frame-accurate video export with live progress",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a range of frames
    Export(ExportArgs),

    /// Check that the encoder is available
    Check,

    /// Show the resolved configuration
    Config {
        /// Write the resolved configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

/// Kind of output to produce.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportKind {
    VideoAndAudio,
    VideoOnly,
    AudioOnly,
    ImageSequence,
}

impl From<ExportKind> for ExportType {
    fn from(kind: ExportKind) -> Self {
        match kind {
            ExportKind::VideoAndAudio => ExportType::VideoAndAudio,
            ExportKind::VideoOnly => ExportType::VideoOnly,
            ExportKind::AudioOnly => ExportType::AudioOnly,
            ExportKind::ImageSequence => ExportType::ImageSequence,
        }
    }
}

#[derive(clap::Args)]
struct ExportArgs {
    /// First frame to export (1-based, inclusive)
    #[arg(long, default_value = "1")]
    start: u64,

    /// Last frame to export (inclusive)
    #[arg(long)]
    end: u64,

    /// Output file path; overrides --folder and --name
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output folder (defaults to the configured exports directory)
    #[arg(long, default_value = "")]
    folder: String,

    /// Output file name (defaults to "Untitled Project")
    #[arg(long, default_value = "")]
    name: String,

    /// What to export
    #[arg(long, value_enum, default_value = "video-and-audio")]
    export_type: ExportKind,

    /// Image sequence suffix, e.g. %05d.png
    #[arg(long, default_value = "%05d.png")]
    image_suffix: String,

    /// Write raw RGBA frames instead of encoding with ffmpeg
    #[arg(long)]
    raw: bool,

    /// Output width
    #[arg(long)]
    width: Option<u32>,

    /// Output height
    #[arg(long)]
    height: Option<u32>,

    /// Output frames per second
    #[arg(long)]
    fps: Option<u32>,

    /// Video encoder, e.g. libx264
    #[arg(long)]
    codec: Option<String>,

    /// Video bitrate or quality, e.g. "8 Mb/s" or "23 crf"
    #[arg(long)]
    video_bitrate: Option<String>,

    /// Start from settings saved by an earlier export
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Replace an existing output file
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    framecast_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Export(args) => commands::export::run(args, &config).await,
        Commands::Check => commands::check::run(&config),
        Commands::Config { init } => commands::config::run(&config, init),
    }
}
