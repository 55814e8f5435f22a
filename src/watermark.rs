use crate::types::{RelayError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Durable mirror of per-source watermarks.
///
/// The on-disk form is a flat JSON object mapping source identifier to the
/// last relayed item id, rewritten wholesale after each cycle that advanced
/// anything. Ids round-trip as strings exactly; they are never parsed.
pub struct WatermarkStore {
    path: PathBuf,
}

impl WatermarkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the persisted mapping. A missing file is an empty mapping, not an
    /// error; a file we cannot read or parse is a `Persistence` error.
    pub async fn load(&self) -> Result<BTreeMap<String, String>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no watermark file at {}, starting empty", self.path.display());
                return Ok(BTreeMap::new());
            }
            Err(e) => {
                return Err(RelayError::Persistence(format!(
                    "reading {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let map: BTreeMap<String, String> = serde_json::from_slice(&bytes)
            .map_err(|e| RelayError::Persistence(format!("parsing {}: {}", self.path.display(), e)))?;
        info!("loaded watermarks for {} source(s)", map.len());
        Ok(map)
    }

    /// Persist the full mapping atomically: write a sibling temp file, then
    /// rename over the target so a crash mid-write leaves either the old or
    /// the new complete file.
    pub async fn save(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(map)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| RelayError::Persistence(format!("writing {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| RelayError::Persistence(format!("renaming into {}: {}", self.path.display(), e)))?;

        debug!("saved watermarks for {} source(s) to {}", map.len(), self.path.display());
        Ok(())
    }
}
