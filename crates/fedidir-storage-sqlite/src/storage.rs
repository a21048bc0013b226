use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use fedidir_core::{
    CommunityRecord, FailureKind, FailureMarker, FediverseRecord, InstanceRecord, StorageKey,
    UptimeSnapshot,
};
use fedidir_storage::{RecordFamily, StorageError, StorageReader, StorageResult};
use rusqlite::{params, Connection, OpenFlags};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// SQLite mirror of the crawler's key-value store: one `crawl_kv` row per
/// key, holding the JSON document the crawler wrote.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

fn query_err(family: RecordFamily) -> impl Fn(rusqlite::Error) -> StorageError {
    move |e| StorageError::Query { family, message: e.to_string() }
}

fn open_err(db_path: &Path) -> impl Fn(rusqlite::Error) -> StorageError + '_ {
    move |e| StorageError::Unavailable(format!("open sqlite db {}: {}", db_path.display(), e))
}

impl SqliteStorage {
    /// Opens (creating if needed) a writable store. Used by tooling that
    /// mirrors crawl data in, and by tests.
    pub fn open(db_path: &Path) -> StorageResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(db_path).map_err(open_err(db_path))?;
        let init_sql = include_str!("../migrations/0001_init.sql");
        conn.execute_batch(init_sql)
            .map_err(|e| StorageError::Unavailable(format!("init schema: {}", e)))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Opens an existing store without write access. The pipeline only ever
    /// reads crawl data.
    pub fn open_read_only(db_path: &Path) -> StorageResult<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(db_path, flags).map_err(open_err(db_path))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn put(&self, key: &str, value: &str) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO crawl_kv(key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| StorageError::Unavailable(format!("write {}: {}", key, e)))?;
        Ok(())
    }

    /// Number of rows per top-level namespace, for `status`/`doctor` output.
    pub fn namespace_counts(&self) -> StorageResult<BTreeMap<String, u64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare("SELECT key FROM crawl_kv")
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let rows = stmt
            .query_map([], |r| r.get::<_, String>(0))
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        let mut counts = BTreeMap::new();
        for row in rows {
            let key = row.map_err(|e| StorageError::Unavailable(e.to_string()))?;
            let ns = key.split_once(':').map(|(ns, _)| ns).unwrap_or("").to_string();
            *counts.entry(ns).or_insert(0) += 1;
        }
        Ok(counts)
    }

    fn scan(&self, family: RecordFamily, prefix: &str) -> StorageResult<Vec<(String, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT key, value FROM crawl_kv
                 WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
            )
            .map_err(query_err(family))?;
        let rows = stmt
            .query_map([prefix], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
            .map_err(query_err(family))?;
        let mut out = vec![];
        for row in rows {
            out.push(row.map_err(query_err(family))?);
        }
        debug!(%family, rows = out.len(), "scanned");
        Ok(out)
    }

    /// Decodes each value on its own; a malformed document is skipped.
    fn decode<T: DeserializeOwned>(
        family: RecordFamily,
        rows: Vec<(String, String)>,
    ) -> Vec<(String, T)> {
        let mut out = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for (key, value) in rows {
            match serde_json::from_str::<T>(&value) {
                Ok(record) => out.push((key, record)),
                Err(e) => {
                    skipped += 1;
                    warn!(%family, %key, error = %e, "skipping malformed record");
                }
            }
        }
        if skipped > 0 {
            warn!(%family, skipped, decoded = out.len(), "malformed records dropped");
        }
        out
    }

    /// Keeps rows whose key decodes to the family's own key shape.
    fn keyed(
        family: RecordFamily,
        rows: Vec<(String, String)>,
        expected: fn(&StorageKey) -> bool,
    ) -> Vec<(String, String)> {
        rows.into_iter()
            .filter(|(key, _)| match StorageKey::parse(key) {
                Ok(k) if expected(&k) => true,
                Ok(_) => {
                    warn!(%family, %key, "skipping row with foreign key");
                    false
                }
                Err(e) => {
                    warn!(%family, %key, error = %e, "skipping undecodable key");
                    false
                }
            })
            .collect()
    }
}

impl StorageReader for SqliteStorage {
    fn list_instance_data(&self) -> StorageResult<Vec<InstanceRecord>> {
        let family = RecordFamily::Instance;
        let rows = self.scan(family, "instance:")?;
        let rows = Self::keyed(family, rows, |k| matches!(k, StorageKey::Instance(_)));
        Ok(Self::decode(family, rows).into_iter().map(|(_, r)| r).collect())
    }

    fn list_community_data(&self) -> StorageResult<Vec<CommunityRecord>> {
        let family = RecordFamily::Community;
        let rows = self.scan(family, "community:")?;
        let rows = Self::keyed(family, rows, |k| matches!(k, StorageKey::Community { .. }));
        Ok(Self::decode(family, rows).into_iter().map(|(_, r)| r).collect())
    }

    fn list_fediverse_data(&self) -> StorageResult<BTreeMap<String, FediverseRecord>> {
        let family = RecordFamily::Fediverse;
        let rows = self.scan(family, "fediverse:")?;
        Ok(Self::decode(family, rows).into_iter().collect())
    }

    fn list_failure_data(
        &self,
        kind: FailureKind,
    ) -> StorageResult<BTreeMap<String, FailureMarker>> {
        let family = RecordFamily::Failure(kind);
        let rows = self.scan(family, &format!("error:{}:", kind))?;
        Ok(Self::decode(family, rows).into_iter().collect())
    }

    fn latest_uptime_data(&self) -> StorageResult<UptimeSnapshot> {
        let family = RecordFamily::Uptime;
        let rows = self.scan(family, "uptime:")?;

        // keys sort as text, so pick the newest by parsed timestamp
        let latest = rows
            .into_iter()
            .filter_map(|(key, value)| match StorageKey::parse(&key) {
                Ok(StorageKey::Uptime(ts)) => Some((ts, key, value)),
                Ok(_) | Err(_) => {
                    warn!(%key, "ignoring uptime row with unexpected key");
                    None
                }
            })
            .max_by_key(|(ts, _, _)| *ts);

        let Some((ts, key, value)) = latest else {
            warn!("no uptime data recorded; publishing without uptime");
            return Ok(UptimeSnapshot::default());
        };

        match serde_json::from_str::<UptimeSnapshot>(&value) {
            Ok(mut snapshot) => {
                snapshot.timestamp.get_or_insert(ts);
                Ok(snapshot)
            }
            Err(e) => {
                warn!(%key, error = %e, "latest uptime record is malformed; using none");
                Ok(UptimeSnapshot::default())
            }
        }
    }
}
