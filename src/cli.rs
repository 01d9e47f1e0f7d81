//! Thin CLI argument shim (§10.5). No review/compare logic lives here —
//! subcommands only parse arguments, build options structs, and call the
//! library.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "canvas-review", about = "Spec-driven visual design review engine", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Emit machine-readable JSON instead of a human summary.
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Review a live URL against a spec.
    Review {
        url: String,
        #[arg(long, default_value = "default")]
        spec: String,
        #[arg(long)]
        scope: Option<String>,
        #[arg(long)]
        annotate: bool,
        #[arg(long)]
        compact: bool,
        #[arg(long)]
        markdown: bool,
    },
    /// Compare a live URL's screenshot against a reference image.
    Compare {
        url: String,
        reference: PathBuf,
        #[arg(long, default_value_t = 5.0)]
        pixel_threshold: f64,
        #[arg(long, default_value_t = 0.95)]
        ssim_threshold: f64,
        #[arg(long, value_enum, default_value_t = DiffStyleArg::Overlay)]
        diff_style: DiffStyleArg,
    },
    /// Validate a spec file: exit 0 if it parses cleanly (§6.1).
    ValidateSpec { path: PathBuf },
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum DiffStyleArg {
    Overlay,
    Sidebyside,
    Heatmap,
}

impl From<DiffStyleArg> for crate::orchestrator::CompareDiffStyle {
    fn from(value: DiffStyleArg) -> Self {
        match value {
            DiffStyleArg::Overlay => crate::orchestrator::CompareDiffStyle::Overlay,
            DiffStyleArg::Sidebyside => crate::orchestrator::CompareDiffStyle::SideBySide,
            DiffStyleArg::Heatmap => crate::orchestrator::CompareDiffStyle::Heatmap,
        }
    }
}
