//! JSON result files.
//!
//! Every command that produces articles can persist them as one JSON array
//! per run, grouped by local date:
//!
//! ```text
//! json_output_dir/
//! └── 2025-05-06/
//!     ├── 081502.json
//!     └── 143318.json
//! ```

use chrono::{DateTime, Local};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write `items` to `{json_output_dir}/{YYYY-MM-DD}/{HHMMSS}.json` for the
/// current local time. Returns the written path.
pub async fn write_articles<T: Serialize>(
    items: &[T],
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    write_articles_at(items, json_output_dir, Local::now()).await
}

#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir, count = items.len()))]
pub async fn write_articles_at<T: Serialize>(
    items: &[T],
    json_output_dir: &str,
    at: DateTime<Local>,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(items)?;

    let full_json_dir = PathBuf::from(json_output_dir).join(at.format("%Y-%m-%d").to_string());
    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(format!("{}.json", at.format("%H%M%S")));
    fs::write(&path, json).await?;
    info!(path = %path.display(), "Wrote JSON results file");
    Ok(path)
}
