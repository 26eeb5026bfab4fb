use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "coglab", version, about = "Build, calibrate for and run keyboard-response experiments")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding saved experiments and the session autosave
    #[arg(long, global = true, env = "COGLAB_STORE", default_value = ".coglab")]
    pub store: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Present an experiment full-screen (or on the terminal with --headless)
    Run(RunArgs),
    /// Degrees of visual angle per centimetre and per pixel
    Angle(AngleArgs),
    /// Estimate the monitor size from a resized on-screen credit card
    Calibrate(CalibrateArgs),
    /// Named experiment snapshots
    #[command(subcommand)]
    Snapshots(SnapshotCommand),
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Experiment document (JSON); without it or --snapshot the session autosave is used
    #[arg(long, conflicts_with = "snapshot")]
    pub file: Option<PathBuf>,
    /// Saved experiment to run
    #[arg(long)]
    pub snapshot: Option<String>,
    /// Log presentations and read keys from stdin instead of opening a window
    #[arg(long, default_value_t = false)]
    pub headless: bool,
    /// Runner settings (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Overrides the seed from --config
    #[arg(long)]
    pub seed: Option<u64>,
    /// TrueType font for text stimuli
    #[arg(long)]
    pub font: Option<PathBuf>,
    /// Write the run report here (JSON)
    #[arg(long)]
    pub results: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct AngleArgs {
    #[arg(long)]
    pub width_cm: Option<f64>,
    #[arg(long)]
    pub height_cm: Option<f64>,
    #[arg(long)]
    pub distance_cm: Option<f64>,
    #[arg(long)]
    pub res_x: Option<u32>,
    #[arg(long)]
    pub res_y: Option<u32>,
}

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// On-screen card width; defaults to the last calibration or 300
    #[arg(long)]
    pub card_width_px: Option<f64>,
    /// On-screen card height; defaults to the last calibration or 189
    #[arg(long)]
    pub card_height_px: Option<f64>,
    /// Arrow keys to apply before estimating (ArrowRight widens by 1%)
    #[arg(long = "nudge", value_name = "KEY")]
    pub nudges: Vec<String>,
    #[arg(long)]
    pub res_x: Option<u32>,
    #[arg(long)]
    pub res_y: Option<u32>,
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Names of every saved experiment
    List,
    /// Save a document file under a name
    Save {
        name: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Print a saved experiment's design and procedure
    Show { name: String },
}
