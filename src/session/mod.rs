//! Session artifact store (§4.7, §6.4): durable, path-referenced output.
//! Screenshot/annotated/diff images are always separate PNG files; nothing
//! binary is ever embedded inline in `session.json` or `report.json`.

use crate::checks::{Diagnostic, Issue};
use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: &str = "1.1";

/// `review_YYYYMMDDHHMMSS###` for [`review`](crate::orchestrator::review)
/// sessions (§9 "Open question" decision).
pub fn new_review_session_id(counter: u32) -> String {
    format!("review_{}{:03}", chrono::Utc::now().format("%Y%m%d%H%M%S"), counter % 1000)
}

/// `ses-<12 hex>` for [`compare`](crate::orchestrator::compare) sessions.
pub fn new_compare_session_id(seed: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(chrono::Utc::now().to_rfc3339().as_bytes());
    hasher.update(seed);
    let digest = hasher.finalize();
    format!("ses-{}", hex::encode(&digest[..6]))
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SpecSummary {
    pub name: String,
    pub version: String,
    pub resolved_from: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Summary {
    pub blocking: usize,
    pub major: usize,
    pub minor: usize,
    pub passing: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PillarGrade {
    pub grade: String,
    pub passing: usize,
    pub attention: usize,
    pub blocking: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Artifacts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
}

/// Compact per-issue summary (§4.7 "Compact mode"): no `details`, no
/// `recommendation`, description capped at 100 chars.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IssueSummary {
    pub id: usize,
    pub check_id: String,
    pub severity: crate::spec::Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    pub description: String,
}

impl From<&Issue> for IssueSummary {
    fn from(issue: &Issue) -> Self {
        let mut description = issue.description.clone();
        if description.chars().count() > 100 {
            description = description.chars().take(99).collect::<String>() + "…";
        }
        Self {
            id: issue.id,
            check_id: issue.check_id.clone(),
            severity: issue.severity,
            element: issue.css_selector.clone(),
            description,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SessionManifest {
    pub schema_version: String,
    pub session_id: String,
    pub url: String,
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
    pub spec: SpecSummary,
    pub summary: Summary,
    pub pillar_grades: HashMap<String, PillarGrade>,
    /// Compact entries only (§4.7); full detail lives in `report.json`.
    pub issues: Vec<IssueSummary>,
    pub artifacts: Artifacts,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Report {
    pub issues: Vec<Issue>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Owns the artifact filesystem root; creates session directories and
/// writes the files that make up a session (§4.7 "Ownership").
pub struct SessionStore {
    root: PathBuf,
}

impl SessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn session_dir(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    pub fn create_session_dir(&self, session_id: &str) -> Result<PathBuf> {
        let dir = self.session_dir(session_id);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn write_manifest(&self, dir: &Path, manifest: &SessionManifest) -> Result<PathBuf> {
        let path = dir.join("session.json");
        let json = serde_json::to_string_pretty(manifest)?;
        assert_no_inline_blobs(&json)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn write_report(&self, dir: &Path, report: &Report) -> Result<PathBuf> {
        let path = dir.join("report.json");
        std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
        Ok(path)
    }

    pub fn write_markdown(&self, dir: &Path, issues: &[Issue]) -> Result<PathBuf> {
        let path = dir.join("issues.md");
        let mut body = String::from("# Review Issues\n\n");
        for issue in issues {
            body.push_str(&format!(
                "## #{} — {} ({})\n\n{}\n\n",
                issue.id, issue.check_id, issue.severity, issue.description
            ));
            if let Some(selector) = &issue.css_selector {
                body.push_str(&format!("Selector: `{selector}`\n\n"));
            }
        }
        std::fs::write(&path, body)?;
        Ok(path)
    }

    pub fn write_image(&self, dir: &Path, filename: &str, image: &image::RgbaImage) -> Result<PathBuf> {
        let path = dir.join(filename);
        image.save(&path).map_err(|e| Error::ArtifactWriteError(e.to_string()))?;
        Ok(path)
    }

    /// Remove a partially-written session directory on fatal failure (§5
    /// "Cancellation & timeouts").
    pub fn discard(&self, dir: &Path) {
        let _ = std::fs::remove_dir_all(dir);
    }
}

/// Invariant 5 (§8): `session.json` never contains a string longer than 1 KB.
fn assert_no_inline_blobs(json: &str) -> Result<()> {
    for value in json.split('"').skip(1).step_by(2) {
        if value.len() > 1024 {
            return Err(Error::ArtifactWriteError(
                "session.json would contain a string longer than 1KB (possible inline blob)".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_session_id_has_expected_shape() {
        let id = new_review_session_id(7);
        assert!(id.starts_with("review_"));
        assert_eq!(id.len(), "review_".len() + 14 + 3);
    }

    #[test]
    fn compare_session_id_has_expected_shape() {
        let id = new_compare_session_id(b"seed");
        assert!(id.starts_with("ses-"));
        assert_eq!(id.len(), "ses-".len() + 12);
    }

    #[test]
    fn writes_manifest_without_inline_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session_dir = store.create_session_dir("review_20260731000000001").unwrap();
        let manifest = SessionManifest {
            schema_version: SCHEMA_VERSION.to_string(),
            session_id: "review_20260731000000001".to_string(),
            url: "https://example.com".to_string(),
            start_time: chrono::Utc::now(),
            end_time: chrono::Utc::now(),
            spec: SpecSummary { name: "default".into(), version: "1.0".into(), resolved_from: vec![] },
            summary: Summary::default(),
            pillar_grades: HashMap::new(),
            issues: vec![],
            artifacts: Artifacts::default(),
        };
        let path = store.write_manifest(&session_dir, &manifest).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn rejects_oversized_embedded_string() {
        let huge = "x".repeat(2000);
        let json = format!(r#"{{"blob": "{huge}"}}"#);
        assert!(assert_no_inline_blobs(&json).is_err());
    }

    #[test]
    fn discard_removes_partial_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let session_dir = store.create_session_dir("review_x").unwrap();
        assert!(session_dir.exists());
        store.discard(&session_dir);
        assert!(!session_dir.exists());
    }
}
