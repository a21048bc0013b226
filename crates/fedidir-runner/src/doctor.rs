use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::{info, warn};

use fedidir_storage_sqlite::SqliteStorage;

use crate::Config;

/// Preflight: the crawl store opens read-only and the output directory is
/// writable.
pub fn doctor(base: &Path, cfg: &Config) -> Result<()> {
    let db_path = cfg.db_path(base);
    if !db_path.exists() {
        return Err(anyhow!("crawl store not found at {}", db_path.display()));
    }
    let storage = SqliteStorage::open_read_only(&db_path)?;
    let counts = storage.namespace_counts()?;
    for family in ["instance", "community", "fediverse"] {
        match counts.get(family) {
            Some(n) => info!(family, rows = n, "crawl data present"),
            None => warn!(family, "no crawl data for family"),
        }
    }

    let out = cfg.output_dir(base);
    std::fs::create_dir_all(&out).with_context(|| format!("create output dir {}", out.display()))?;
    let check_file = out.join(".fedidir-doctor");
    std::fs::write(&check_file, b"ok")
        .with_context(|| format!("output dir {} is not writable", out.display()))?;
    std::fs::remove_file(&check_file).ok();

    info!(
        db = %db_path.display(),
        output = %out.display(),
        max_age_secs = cfg.filter.max_age_secs,
        publish = ?cfg.output.publish,
        "doctor ok"
    );
    Ok(())
}
