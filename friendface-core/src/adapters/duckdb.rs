//! DuckDB repository implementation

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use duckdb::{params, Connection};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::result::StoreError;
use crate::domain::transfer::parse_iso8601;
use crate::domain::{Friend, IngestBatch, User, UserRecord};
use crate::ports::UserStore;
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
}

const USER_COLUMNS: &str = "user_id, is_active, name, age, company, email, address, about, registered, tags";

/// A committed sync, as recorded in `sys_sync_runs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncRun {
    pub run_id: String,
    pub source: String,
    pub started_at: String,
    pub finished_at: String,
    pub users_ingested: i64,
    pub users_new: i64,
    pub friends_ingested: i64,
    pub warning_count: i64,
}

/// DuckDB-backed profile cache
///
/// All access goes through one connection behind a mutex, so writes are
/// serialized and each batch is applied inside a single DuckDB transaction.
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the cache file
    ///
    /// Retries with exponential backoff while another process holds the file.
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            error = %err_msg,
                            "database busy, retrying"
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(StoreError::io(err_msg));
                }
            }
        }

        Err(last_error
            .map(|e| StoreError::io(e.to_string()))
            .unwrap_or_else(|| {
                StoreError::io(format!("Failed to open database after {} retries", MAX_RETRIES))
            }))
    }

    /// Non-persistent cache, used by tests and previews
    pub fn in_memory() -> Result<Self, StoreError> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_in_memory_with_flags(config)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> duckdb::Result<Connection> {
        // Extension autoloading stays off; the json extension is linked statically
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|e| StoreError::io(format!("Lock poisoned: {}", e)))
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> anyhow::Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> anyhow::Result<()> {
        self.run_migrations()?;
        Ok(())
    }

    /// Cache migrations not yet applied to this database
    pub fn pending_migrations(&self) -> anyhow::Result<Vec<String>> {
        let conn = self.lock()?;
        MigrationService::new(&conn).get_pending()
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    // === Batch writes ===

    /// Upsert a batch inside one transaction
    ///
    /// Users keep their original `seq` on update, so read order is the order in
    /// which each id was first ingested. Each batch user's memberships are
    /// replaced by the batch's edges. Friend rows are never deleted.
    pub fn insert_batch(&self, batch: &IngestBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        check_batch_integrity(&tx, batch)?;

        let now = Utc::now().to_rfc3339();

        for user in &batch.users {
            tx.execute(
                "INSERT INTO users (user_id, is_active, name, age, company, email, address,
                                    about, registered, tags, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT (user_id) DO UPDATE SET
                    is_active = EXCLUDED.is_active,
                    name = EXCLUDED.name,
                    age = EXCLUDED.age,
                    company = EXCLUDED.company,
                    email = EXCLUDED.email,
                    address = EXCLUDED.address,
                    about = EXCLUDED.about,
                    registered = EXCLUDED.registered,
                    tags = EXCLUDED.tags,
                    updated_at = EXCLUDED.updated_at",
                params![
                    user.id,
                    user.is_active,
                    user.name,
                    user.age,
                    user.company,
                    user.email,
                    user.address,
                    user.about,
                    user.registered.map(|dt| dt.to_rfc3339()),
                    user.tags,
                    now,
                    now,
                ],
            )?;
        }

        for friend in &batch.friends {
            tx.execute(
                "INSERT INTO friends (friend_id, name, created_at, updated_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (friend_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    updated_at = EXCLUDED.updated_at",
                params![friend.id, friend.name, now, now],
            )?;
        }

        for user in &batch.users {
            tx.execute("DELETE FROM user_friends WHERE user_id = ?", params![user.id])?;
        }

        for edge in &batch.edges {
            tx.execute(
                "INSERT INTO user_friends (user_id, friend_id, sort_order) VALUES (?, ?, ?)",
                params![edge.user_id, edge.friend_id, edge.position],
            )?;
        }

        tx.commit()?;
        debug!(
            users = batch.users.len(),
            friends = batch.friends.len(),
            edges = batch.edges.len(),
            "batch committed"
        );
        Ok(())
    }

    // === Reads ===

    pub fn query_all_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.lock()?;

        let records = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY seq",
                USER_COLUMNS
            ))?;
            let rows = stmt.query_map([], row_to_user_record)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut friends_by_user: HashMap<String, Vec<Friend>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT uf.user_id, f.friend_id, f.name
                 FROM user_friends uf
                 JOIN friends f ON f.friend_id = uf.friend_id
                 ORDER BY uf.user_id, uf.sort_order",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    Friend::new(row.get::<_, String>(1)?, row.get::<_, Option<String>>(2)?),
                ))
            })?;
            for row in rows {
                let (user_id, friend) = row?;
                friends_by_user.entry(user_id).or_default().push(friend);
            }
        }

        Ok(records
            .into_iter()
            .map(|record| {
                let friends = friends_by_user.remove(&record.id).unwrap_or_default();
                User::from_record(record, friends)
            })
            .collect())
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.lock()?;

        let record = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users WHERE user_id = ?",
                USER_COLUMNS
            ))?;
            let mut rows = stmt.query_map([id], row_to_user_record)?;
            match rows.next() {
                Some(row) => row?,
                None => return Ok(None),
            }
        };

        let mut stmt = conn.prepare(
            "SELECT f.friend_id, f.name
             FROM user_friends uf
             JOIN friends f ON f.friend_id = uf.friend_id
             WHERE uf.user_id = ?
             ORDER BY uf.sort_order",
        )?;
        let friends = stmt
            .query_map([id], |row| {
                Ok(Friend::new(
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(User::from_record(record, friends)))
    }

    pub fn existing_user_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.lock()?;
        let stored = user_ids(&conn)?;
        Ok(ids.iter().filter(|id| stored.contains(*id)).cloned().collect())
    }

    pub fn count_users(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(*) FROM users")
    }

    pub fn count_friends(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(*) FROM friends")
    }

    pub fn count_memberships(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(*) FROM user_friends")
    }

    fn count(&self, sql: &str) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    }

    // === Sync runs ===

    pub fn record_sync_run(&self, run: &SyncRun) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sys_sync_runs (run_id, source, started_at, finished_at,
                                        users_ingested, users_new, friends_ingested, warning_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                run.run_id,
                run.source,
                run.started_at,
                run.finished_at,
                run.users_ingested,
                run.users_new,
                run.friends_ingested,
                run.warning_count,
            ],
        )?;
        Ok(())
    }

    pub fn last_sync_run(&self) -> Result<Option<SyncRun>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, source, started_at, finished_at,
                    users_ingested, users_new, friends_ingested, warning_count
             FROM sys_sync_runs
             ORDER BY finished_at DESC
             LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], |row| {
            Ok(SyncRun {
                run_id: row.get(0)?,
                source: row.get(1)?,
                started_at: row.get(2)?,
                finished_at: row.get(3)?,
                users_ingested: row.get(4)?,
                users_new: row.get(5)?,
                friends_ingested: row.get(6)?,
                warning_count: row.get(7)?,
            })
        })?;
        match rows.next() {
            Some(run) => Ok(Some(run?)),
            None => Ok(None),
        }
    }

    // === Health checks ===

    /// Memberships pointing at a user or friend that doesn't exist
    pub fn check_dangling_memberships(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT uf.user_id, uf.friend_id,
                    u.user_id IS NULL AS missing_user,
                    f.friend_id IS NULL AS missing_friend
             FROM user_friends uf
             LEFT JOIN users u ON u.user_id = uf.user_id
             LEFT JOIN friends f ON f.friend_id = uf.friend_id
             WHERE u.user_id IS NULL OR f.friend_id IS NULL
             ORDER BY uf.user_id, uf.sort_order",
        )?;
        let rows = stmt.query_map([], |row| {
            let user_id: String = row.get(0)?;
            let friend_id: String = row.get(1)?;
            let missing_user: bool = row.get(2)?;
            let missing_friend: bool = row.get(3)?;
            Ok(match (missing_user, missing_friend) {
                (true, true) => format!("{} -> {}: user and friend missing", user_id, friend_id),
                (true, false) => format!("{} -> {}: user missing", user_id, friend_id),
                _ => format!("{} -> {}: friend missing", user_id, friend_id),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Friends no user lists any more
    pub fn count_orphaned_friends(&self) -> Result<i64, StoreError> {
        self.count(
            "SELECT COUNT(*) FROM friends f
             WHERE NOT EXISTS (SELECT 1 FROM user_friends uf WHERE uf.friend_id = f.friend_id)",
        )
    }

    pub fn count_users_with_empty_id(&self) -> Result<i64, StoreError> {
        self.count("SELECT COUNT(*) FROM users WHERE user_id = ''")
    }

    /// Size of the cache file in bytes (0 for in-memory)
    pub fn get_db_size(&self) -> Result<u64, StoreError> {
        match &self.db_path {
            Some(path) => std::fs::metadata(path)
                .map(|m| m.len())
                .map_err(|e| StoreError::io(e.to_string())),
            None => Ok(0),
        }
    }
}

impl UserStore for DuckDbRepository {
    fn insert_batch(&self, batch: &IngestBatch) -> Result<(), StoreError> {
        DuckDbRepository::insert_batch(self, batch)
    }

    fn query_all_users(&self) -> Result<Vec<User>, StoreError> {
        DuckDbRepository::query_all_users(self)
    }

    fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        DuckDbRepository::get_user(self, id)
    }

    fn existing_user_ids(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        DuckDbRepository::existing_user_ids(self, ids)
    }
}

// Helper functions

fn row_to_user_record(row: &duckdb::Row) -> duckdb::Result<UserRecord> {
    let registered = match row.get::<_, Option<String>>(8)? {
        Some(raw) => Some(parse_iso8601(&raw).ok_or_else(|| {
            duckdb::Error::FromSqlConversionFailure(
                8,
                duckdb::types::Type::Text,
                format!("invalid registered timestamp '{}'", raw).into(),
            )
        })?),
        None => None,
    };
    Ok(UserRecord {
        id: row.get(0)?,
        is_active: row.get(1)?,
        name: row.get(2)?,
        age: row.get(3)?,
        company: row.get(4)?,
        email: row.get(5)?,
        address: row.get(6)?,
        about: row.get(7)?,
        registered,
        tags: row.get(9)?,
    })
}

fn user_ids(conn: &Connection) -> Result<HashSet<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT user_id FROM users")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

fn friend_ids(conn: &Connection) -> Result<HashSet<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT friend_id FROM friends")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<HashSet<_>, _>>()?;
    Ok(ids)
}

/// Reject a batch that would leave the store inconsistent
fn check_batch_integrity(conn: &Connection, batch: &IngestBatch) -> Result<(), StoreError> {
    let mut batch_users = HashSet::new();
    for user in &batch.users {
        if user.id.is_empty() {
            return Err(StoreError::constraint("user with empty id"));
        }
        if !batch_users.insert(user.id.as_str()) {
            return Err(StoreError::constraint(format!(
                "user {} appears twice in one batch",
                user.id
            )));
        }
    }

    let mut batch_friends = HashSet::new();
    for friend in &batch.friends {
        if friend.id.is_empty() {
            return Err(StoreError::constraint("friend with empty id"));
        }
        if !batch_friends.insert(friend.id.as_str()) {
            return Err(StoreError::constraint(format!(
                "friend {} appears twice in one batch",
                friend.id
            )));
        }
    }

    if batch.edges.is_empty() {
        return Ok(());
    }

    let stored_users = user_ids(conn)?;
    let stored_friends = friend_ids(conn)?;

    for edge in &batch.edges {
        if !batch_users.contains(edge.user_id.as_str()) {
            // Memberships of users outside the batch would survive the replace step
            let reason = if stored_users.contains(&edge.user_id) {
                "is not part of this batch"
            } else {
                "does not exist"
            };
            return Err(StoreError::constraint(format!(
                "membership references user {} which {}",
                edge.user_id, reason
            )));
        }
        if !batch_friends.contains(edge.friend_id.as_str())
            && !stored_friends.contains(&edge.friend_id)
        {
            return Err(StoreError::constraint(format!(
                "membership references friend {} which does not exist",
                edge.friend_id
            )));
        }
    }

    Ok(())
}
