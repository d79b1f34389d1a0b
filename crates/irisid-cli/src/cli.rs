use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "irisid",
    about = "Enroll, verify and identify subjects from iris images",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable logs
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Segment an eye image and store its template under a subject id
    Enroll(EnrollArgs),
    /// Check whether an eye image belongs to a claimed subject
    Verify(VerifyArgs),
    /// Rank enrolled subjects by similarity to an eye image
    Identify(IdentifyArgs),
    /// Inspect the template store
    #[command(subcommand)]
    Templates(TemplatesCommands),
}

#[derive(Debug, Subcommand)]
pub enum TemplatesCommands {
    /// Summarize enrolled templates per subject
    List(TemplatesListArgs),
}

#[derive(Debug, Clone, Args)]
pub struct EnrollArgs {
    /// Raw eye image to enroll
    pub image: PathBuf,

    /// Subject id the template is stored under
    #[arg(long)]
    pub id: String,

    /// Template store CSV (defaults to $IRISID_DATASET or config dataset_path)
    #[arg(long)]
    pub dataset: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    /// Probe eye image
    pub image: PathBuf,

    /// Claimed subject id
    #[arg(long)]
    pub id: String,

    /// Template store CSV (defaults to $IRISID_DATASET or config dataset_path)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Acceptance threshold; the claim is accepted when the nearest template
    /// is strictly closer (defaults to config verification_threshold)
    #[arg(long)]
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, Args)]
pub struct IdentifyArgs {
    /// Probe eye image
    pub image: PathBuf,

    /// Template store CSV (defaults to $IRISID_DATASET or config dataset_path)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Open-set acceptance threshold; omit for a closed-set search
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Number of ranked candidates to report (defaults to config max_rank)
    #[arg(long)]
    pub max_rank: Option<usize>,
}

#[derive(Debug, Clone, Args)]
pub struct TemplatesListArgs {
    /// Template store CSV (defaults to $IRISID_DATASET or config dataset_path)
    #[arg(long)]
    pub dataset: Option<PathBuf>,

    /// Only report this subject
    #[arg(long)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}
