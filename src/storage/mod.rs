//! Rank snapshot persistence.
//!
//! The snapshot is the only state handed from one scan to the next. The
//! analysis core never touches the disk: the binary loads the snapshot
//! before a run and saves the new one after a successful run.
//!
//! Saves go through a sibling `.tmp` file that is renamed over the target,
//! so a reader sees either the old snapshot or the new one, never a torn
//! file.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::types::RankSnapshot;

/// Default snapshot file path.
const DEFAULT_SNAPSHOT_FILE: &str = "rank_snapshot.json";

/// Staging file written before the rename.
fn staging_path(path: &Path) -> PathBuf {
    let mut staged = path.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

/// Atomically replace the snapshot file with `snapshot`.
pub fn save_snapshot(snapshot: &RankSnapshot, path: Option<&str>) -> Result<()> {
    let path = Path::new(path.unwrap_or(DEFAULT_SNAPSHOT_FILE));
    let staged = staging_path(path);

    let json = serde_json::to_vec_pretty(snapshot).context("Failed to serialise rank snapshot")?;
    fs::write(&staged, &json)
        .with_context(|| format!("Failed to stage rank snapshot at {}", staged.display()))?;

    if let Err(e) = fs::rename(&staged, path) {
        let _ = fs::remove_file(&staged);
        return Err(e)
            .with_context(|| format!("Failed to move rank snapshot into {}", path.display()));
    }

    debug!(
        path = %path.display(),
        overbought = snapshot.overbought.len(),
        oversold = snapshot.oversold.len(),
        "Rank snapshot saved"
    );
    Ok(())
}

/// Load the snapshot saved by the previous run.
/// `None` when no snapshot exists yet.
pub fn load_snapshot(path: Option<&str>) -> Result<Option<RankSnapshot>> {
    let path = Path::new(path.unwrap_or(DEFAULT_SNAPSHOT_FILE));

    if !path.exists() {
        info!(path = %path.display(), "No rank snapshot found, starting fresh");
        return Ok(None);
    }

    let raw = fs::read(path)
        .with_context(|| format!("Failed to read rank snapshot from {}", path.display()))?;
    let snapshot: RankSnapshot = serde_json::from_slice(&raw)
        .with_context(|| format!("Failed to parse rank snapshot from {}", path.display()))?;

    info!(
        path = %path.display(),
        overbought = snapshot.overbought.len(),
        oversold = snapshot.oversold.len(),
        "Rank snapshot loaded"
    );
    Ok(Some(snapshot))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
