//! Environment/runtime helpers
//!
//! Sanity checks to ensure the record store root exists at startup.

use std::path::Path;

use tracing::info;

/// Ensure the data directory exists, creating it (and parents) when missing.
pub async fn ensure_data_dir(data_dir: impl AsRef<Path>) -> anyhow::Result<()> {
    let data_dir = data_dir.as_ref();
    if tokio::fs::metadata(data_dir).await.is_err() {
        info!(data_dir = %data_dir.display(), "creating data directory");
    }
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", data_dir.display()))?;
    Ok(())
}
