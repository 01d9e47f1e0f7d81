//! Layered configuration (§10.3), following the reference project's own
//! root-discovery-then-merge pattern: an optional `.canvas/config.yaml`
//! (or `CANVAS_REVIEW_CONFIG` env override) supplies defaults; explicit
//! per-call options always win. A missing file is not an error.

use crate::capture::Viewport;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_ENV_VAR: &str = "CANVAS_REVIEW_CONFIG";
const CONFIG_RELATIVE_PATH: &str = ".canvas/config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub pixel_threshold: f64,
    pub ssim_threshold: f64,
    pub viewport: Viewport,
    pub artifact_root: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: 5.0,
            ssim_threshold: 0.95,
            viewport: Viewport { width: 1280, height: 800 },
            artifact_root: PathBuf::from(".canvas/reviews"),
        }
    }
}

impl EngineConfig {
    /// Discover config from `CANVAS_REVIEW_CONFIG` if set, else
    /// `<project_root>/.canvas/config.yaml`; built-in defaults otherwise.
    pub fn discover(project_root: &Path) -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load_or_default(Path::new(&path));
        }
        Self::load_or_default(&project_root.join(CONFIG_RELATIVE_PATH))
    }

    fn load_or_default(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(source) => Ok(serde_norway::from_str(&source)?),
            Err(_) => Ok(Self::default()),
        }
    }
}
