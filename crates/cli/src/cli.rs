use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[command(name = "cutdesk")]
#[command(about = "Headless front-end for the Cutdesk editing core")]
pub struct Cli {
    /// JSON file with engine tunables.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the silence amplitude threshold (0..=1).
    #[arg(long, global = true)]
    pub silence_threshold: Option<f32>,

    /// Override the padding kept by `tighten` commands, in milliseconds.
    #[arg(long, global = true)]
    pub leave_ms: Option<f64>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CliCommand {
    /// Write a new project with one video and one audio track.
    New {
        path: PathBuf,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Load a project and print its integrity report.
    Check { project: PathBuf },
    /// Evaluate a text command against probe metadata and peaks.
    Parse {
        /// Probe metadata as JSON.
        #[arg(long)]
        probe: PathBuf,
        /// Peaks as a JSON array.
        #[arg(long)]
        peaks: Option<PathBuf>,
        /// Peaks are raw 16-bit values rather than normalized amplitudes.
        #[arg(long)]
        pcm: bool,
        /// Command text, e.g. `tighten silence > 2 leave 150 ms`.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Replay JSON-lines engine commands and print the resulting events.
    Run {
        /// Project to load before replaying.
        #[arg(long)]
        project: Option<PathBuf>,
        /// File with one JSON command per line.
        #[arg(long)]
        script: PathBuf,
        /// Save the resulting project here.
        #[arg(long)]
        save: Option<PathBuf>,
    },
}
