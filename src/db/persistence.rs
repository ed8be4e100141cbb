use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::IdCounters;
use crate::models::{Garden, Layout, Plant};

/// On-disk document: everything except users and sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub plants: Vec<Plant>,
    #[serde(default)]
    pub gardens: Vec<Garden>,
    #[serde(default)]
    pub layouts: Vec<Layout>,
    #[serde(default)]
    pub id_counters: IdCounters,
    pub saved_at: Option<DateTime<Utc>>,
}

/// Writes the snapshot as pretty JSON, creating the parent directory if needed.
pub async fn save(path: &Path, snapshot: &Snapshot) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_vec_pretty(snapshot)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    debug!("data saved to {}", path.display());
    Ok(())
}

/// Reads a snapshot; `Ok(None)` when the file does not exist.
pub async fn load(path: &Path) -> anyhow::Result<Option<Snapshot>> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };
    let snapshot = serde_json::from_slice(&raw)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(snapshot))
}
