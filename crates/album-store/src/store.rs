//! The SQLite membership store.
//!
//! Schema notes:
//!
//! - `album_memberships` is the source of truth for "what did we put
//!   there": one row per (rule, album, asset), `WITHOUT ROWID` since the
//!   composite key is the access path. A row's `match_kind` and `added_at`
//!   are written once and survive snapshot replaces, so an exact match is
//!   never rewritten as fuzzy by a later cycle (or the other way around).
//! - `analyzed_assets` tracks when each asset was first and last seen by
//!   any rule, for operator forensics.
//! - `sync_runs` is an append-only run history.
//!
//! Timestamps are RFC 3339 TEXT throughout.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::error::{Result, StoreError};

const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Staged migrations; index + 1 is the schema version.
const MIGRATIONS: &[&str] = &[
    // v1: initial schema
    "CREATE TABLE album_memberships (
         rule_id    TEXT NOT NULL,
         album_id   TEXT NOT NULL,
         asset_id   TEXT NOT NULL,
         match_kind TEXT NOT NULL DEFAULT 'exact',
         added_at   TEXT NOT NULL,
         PRIMARY KEY (rule_id, album_id, asset_id)
     ) WITHOUT ROWID;

     CREATE INDEX idx_memberships_rule
         ON album_memberships (rule_id, album_id);

     CREATE TABLE analyzed_assets (
         asset_id   TEXT PRIMARY KEY,
         first_seen TEXT NOT NULL,
         last_seen  TEXT NOT NULL
     ) WITHOUT ROWID;

     CREATE TABLE sync_runs (
         id              INTEGER PRIMARY KEY AUTOINCREMENT,
         started_at      TEXT NOT NULL,
         completed_at    TEXT,
         status          TEXT NOT NULL,
         rules_processed INTEGER NOT NULL DEFAULT 0,
         assets_added    INTEGER NOT NULL DEFAULT 0,
         assets_removed  INTEGER NOT NULL DEFAULT 0,
         error_message   TEXT
     );",
];

/// How an asset earned its album membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Matched the rule's conditions directly.
    Exact,
    /// Pulled in by time/location proximity to an exact match.
    Fuzzy,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Fuzzy => "fuzzy",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "exact" => Ok(MatchKind::Exact),
            "fuzzy" => Ok(MatchKind::Fuzzy),
            other => Err(StoreError::Corrupt(format!("unknown match kind '{other}'"))),
        }
    }
}

/// One persisted membership row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub asset_id: String,
    pub kind: MatchKind,
    pub added_at: DateTime<Utc>,
}

/// Terminal state of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    CompletedWithErrors,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::CompletedWithErrors => "completed_with_errors",
            RunStatus::Failed => "failed",
        }
    }

    fn parse(raw: &str) -> Result<Self> {
        match raw {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "completed_with_errors" => Ok(RunStatus::CompletedWithErrors),
            "failed" => Ok(RunStatus::Failed),
            other => Err(StoreError::Corrupt(format!("unknown run status '{other}'"))),
        }
    }
}

/// What the engine reports when a run finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub rules_processed: u32,
    pub assets_added: u64,
    pub assets_removed: u64,
    pub error_message: Option<String>,
}

/// One row of the run history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub rules_processed: u32,
    pub assets_added: u64,
    pub assets_removed: u64,
    pub error_message: Option<String>,
}

/// Handle to the sync state database.
pub struct MembershipStore {
    conn: Connection,
}

impl MembershipStore {
    /// Open (creating if needed) the store at `path`, applying pragmas and
    /// any pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        Self::initialize(conn)
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(mut conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA mmap_size = 268435456;",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrate(&mut conn)?;
        Ok(Self { conn })
    }

    /// Everything persisted for one (rule, album), ordered by asset id.
    pub fn get_membership(&self, rule_id: &str, album_id: &str) -> Result<Vec<MatchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT asset_id, match_kind, added_at
             FROM album_memberships
             WHERE rule_id = ?1 AND album_id = ?2
             ORDER BY asset_id",
        )?;
        let rows = stmt.query_map(params![rule_id, album_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (asset_id, kind, added_at) = row?;
            records.push(MatchRecord {
                asset_id,
                kind: MatchKind::parse(&kind)?,
                added_at: parse_timestamp(&added_at)?,
            });
        }
        Ok(records)
    }

    /// Replace the (rule, album) membership snapshot in one transaction.
    ///
    /// Rows that survive the replace keep their stored `match_kind` and
    /// `added_at`; only genuinely new assets take the kind computed this
    /// cycle.
    pub fn put_membership(
        &mut self,
        rule_id: &str,
        album_id: &str,
        entries: &[(String, MatchKind)],
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;

        let existing: HashMap<String, (String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT asset_id, match_kind, added_at
                 FROM album_memberships
                 WHERE rule_id = ?1 AND album_id = ?2",
            )?;
            let rows = stmt.query_map(params![rule_id, album_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    (row.get::<_, String>(1)?, row.get::<_, String>(2)?),
                ))
            })?;
            let mut map = HashMap::new();
            for row in rows {
                let (asset_id, kept) = row?;
                map.insert(asset_id, kept);
            }
            map
        };

        tx.execute(
            "DELETE FROM album_memberships WHERE rule_id = ?1 AND album_id = ?2",
            params![rule_id, album_id],
        )?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO album_memberships
                     (rule_id, album_id, asset_id, match_kind, added_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (asset_id, kind) in entries {
                let (kind_str, added_at) = match existing.get(asset_id) {
                    Some((kept_kind, kept_at)) => (kept_kind.clone(), kept_at.clone()),
                    None => (kind.as_str().to_string(), now.clone()),
                };
                insert.execute(params![rule_id, album_id, asset_id, kind_str, added_at])?;
            }
        }
        tx.commit()?;
        debug!(rule = rule_id, album = album_id, rows = entries.len(), "membership snapshot stored");
        Ok(())
    }

    /// Upsert the analyzed-assets ledger: first sight inserts, later sights
    /// only bump `last_seen`.
    pub fn record_assets_seen(&mut self, asset_ids: &[String]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO analyzed_assets (asset_id, first_seen, last_seen)
                 VALUES (?1, ?2, ?2)
                 ON CONFLICT(asset_id) DO UPDATE SET last_seen = excluded.last_seen",
            )?;
            for asset_id in asset_ids {
                stmt.execute(params![asset_id, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    pub fn seen_asset_count(&self) -> Result<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM analyzed_assets", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Open a new run-history row, returning its id.
    pub fn start_sync_run(&mut self) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO sync_runs (started_at, status) VALUES (?1, ?2)",
            params![Utc::now().to_rfc3339(), RunStatus::Running.as_str()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Close a run-history row.
    pub fn complete_sync_run(&mut self, run_id: i64, outcome: &RunOutcome) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_runs
             SET completed_at = ?2,
                 status = ?3,
                 rules_processed = ?4,
                 assets_added = ?5,
                 assets_removed = ?6,
                 error_message = ?7
             WHERE id = ?1",
            params![
                run_id,
                Utc::now().to_rfc3339(),
                outcome.status.as_str(),
                outcome.rules_processed,
                outcome.assets_added as i64,
                outcome.assets_removed as i64,
                outcome.error_message,
            ],
        )?;
        Ok(())
    }

    /// The most recent run, if any.
    pub fn last_sync_run(&self) -> Result<Option<SyncRunRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, started_at, completed_at, status,
                        rules_processed, assets_added, assets_removed, error_message
                 FROM sync_runs
                 ORDER BY id DESC
                 LIMIT 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                },
            )
            .optional()?;

        match row {
            None => Ok(None),
            Some((id, started, completed, status, rules, added, removed, error)) => {
                Ok(Some(SyncRunRecord {
                    id,
                    started_at: parse_timestamp(&started)?,
                    completed_at: completed.as_deref().map(parse_timestamp).transpose()?,
                    status: RunStatus::parse(&status)?,
                    rules_processed: rules,
                    assets_added: added as u64,
                    assets_removed: removed as u64,
                    error_message: error,
                }))
            }
        }
    }
}

fn migrate(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version    INTEGER PRIMARY KEY,
             applied_at TEXT NOT NULL
         )",
    )?;
    let current: i64 = tx.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    for (index, migration) in MIGRATIONS.iter().enumerate() {
        let version = index as i64 + 1;
        if version > current {
            tx.execute_batch(migration)?;
            tx.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![version, Utc::now().to_rfc3339()],
            )?;
            debug!(version, "applied store migration");
        }
    }
    tx.commit()?;
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad stored timestamp '{raw}': {e}")))
}
