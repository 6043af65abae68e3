use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "otoware")]
#[command(author, version, about = "Turn audio and video into loud, clipped audio")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Start {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Process a single file without the web server
    Run {
        /// Input audio or video file
        #[arg(required = true)]
        input: PathBuf,

        /// Directory to write the result into
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// MIME type of the input (guessed from the extension if omitted)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (falls back to --config, then defaults)
        #[arg(value_name = "CONFIG")]
        file: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
