use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::recovery::persist::diagnostic_path;

/// `MMDD_HH-mm-ss`, the run stamp embedded in every artifact name.
const RUN_STAMP_FORMAT: &str = "%m%d_%H-%M-%S";

const TRANSCRIPT_SUFFIX: &str = ".json";
const DIAGNOSTIC_SUFFIX: &str = ".raw.txt";
const HISTORY_SUFFIX: &str = ".history.json";

/// Output locations reserved for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Validated transcript JSON.
    pub transcript: PathBuf,
    /// Raw agent output, written only when recovery fails.
    pub diagnostic: PathBuf,
    /// Agent execution history, when the runtime reports one.
    pub history: PathBuf,
}

impl ArtifactPaths {
    /// Build paths qualified by `stamp`. If a previous run already used the
    /// stamp, a numeric suffix is appended until no artifact would be
    /// overwritten.
    pub fn for_run(dir: &Path, prefix: &str, stamp: NaiveDateTime) -> Self {
        let base = format!("{}_{}", prefix, stamp.format(RUN_STAMP_FORMAT));

        let mut attempt = 0u32;
        loop {
            let stem = if attempt == 0 {
                base.clone()
            } else {
                format!("{}_{}", base, attempt)
            };
            let paths = Self::with_stem(dir, &stem);
            if !paths.any_exists() {
                return paths;
            }
            tracing::debug!("Artifact name {} already used, trying next", stem);
            attempt += 1;
        }
    }

    fn with_stem(dir: &Path, stem: &str) -> Self {
        let transcript = dir.join(format!("{stem}{TRANSCRIPT_SUFFIX}"));
        Self {
            diagnostic: diagnostic_path(&transcript),
            history: dir.join(format!("{stem}{HISTORY_SUFFIX}")),
            transcript,
        }
    }

    fn any_exists(&self) -> bool {
        self.transcript.exists() || self.diagnostic.exists() || self.history.exists()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Transcript,
    Diagnostic,
    History,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transcript => f.pad("Transcript"),
            Self::Diagnostic => f.pad("Raw"),
            Self::History => f.pad("History"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactEntry {
    pub path: PathBuf,
    pub name: String,
    pub kind: ArtifactKind,
    pub size: u64,
    pub modified: SystemTime,
}

fn classify(name: &str, prefix: &str) -> Option<ArtifactKind> {
    if !name.starts_with(&format!("{prefix}_")) {
        return None;
    }
    if name.ends_with(DIAGNOSTIC_SUFFIX) {
        Some(ArtifactKind::Diagnostic)
    } else if name.ends_with(HISTORY_SUFFIX) {
        Some(ArtifactKind::History)
    } else if name.ends_with(TRANSCRIPT_SUFFIX) {
        Some(ArtifactKind::Transcript)
    } else {
        None
    }
}

/// Run artifacts in `dir`, newest first. A missing directory yields none.
pub fn list_artifacts(dir: &Path, prefix: &str) -> Result<Vec<ArtifactEntry>> {
    let mut entries = Vec::new();

    if !dir.exists() {
        return Ok(entries);
    }

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(kind) = classify(&name, prefix) else {
            continue;
        };
        let metadata = entry.metadata()?;
        entries.push(ArtifactEntry {
            path: entry.path(),
            name,
            kind,
            size: metadata.len(),
            modified: metadata.modified()?,
        });
    }

    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
    Ok(entries)
}
