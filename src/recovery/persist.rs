use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::recovery::outcome::RecoveryOutcome;

/// Characters of raw agent output shown in the failure log line.
const RAW_PREVIEW_CHARS: usize = 300;

/// Diagnostic file used in place of `destination` when recovery fails.
pub fn diagnostic_path(destination: &Path) -> PathBuf {
    destination.with_extension("raw.txt")
}

/// Write the artifact for `outcome` and log a short operator summary.
///
/// Success writes the pretty-printed transcript to `destination`; failure
/// writes the raw text verbatim to [`diagnostic_path`]. Returns the path that
/// was written. Only I/O errors are returned.
pub fn persist(
    outcome: &RecoveryOutcome,
    destination: &Path,
    preview_segments: usize,
) -> Result<PathBuf> {
    match outcome {
        RecoveryOutcome::Success(set) => {
            let content = set
                .to_pretty_json()
                .context("Failed to serialize transcript")?;
            write_atomic(destination, content.as_bytes())?;

            tracing::info!(
                "Wrote {} transcriptions to {}",
                set.len(),
                destination.display()
            );
            for segment in set.segments().iter().take(preview_segments) {
                tracing::info!("  [{}] {}", segment.timestamp, segment.text);
            }
            if set.len() > preview_segments {
                tracing::info!("  ... {} more", set.len() - preview_segments);
            }

            Ok(destination.to_path_buf())
        }
        RecoveryOutcome::Failure { reason, raw } => {
            let path = diagnostic_path(destination);
            write_atomic(&path, raw.as_bytes())?;

            tracing::warn!("Could not recover transcript ({})", reason);
            tracing::warn!("Raw result: {}", preview(raw, RAW_PREVIEW_CHARS));
            tracing::info!("Raw result saved to {}", path.display());

            Ok(path)
        }
    }
}

/// Write via a sibling temp file and rename, so `path` is either the full
/// content or absent.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("artifact path has no filename: {}", path.display()))?;
    let mut tmp_name = std::ffi::OsString::from(".");
    tmp_name.push(file_name);
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("Failed to move artifact into {}", path.display()));
    }
    Ok(())
}

/// First `max_chars` characters of `text` on one line, with an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let flat = flat.trim();

    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat.to_string(),
    }
}
