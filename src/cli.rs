use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "tubescribe",
    version,
    about = "Pull a YouTube transcript through a browser agent and save it as JSON"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent against a video and recover its transcript (default)
    Run {
        /// Video URL (overrides [task] video_url)
        #[arg(long)]
        video: Option<String>,

        /// Output directory (overrides [output] directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Recover a transcript from a saved agent result ("-" reads stdin)
    Recover {
        /// File holding the raw agent result, e.g. a previous .raw.txt
        input: PathBuf,

        /// Output directory (overrides [output] directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List transcripts and diagnostics from previous runs
    Status {
        /// Output directory (overrides [output] directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a commented default config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
