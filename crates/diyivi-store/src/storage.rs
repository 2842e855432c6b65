use diyivi_core::{CoreError, CoreResult, StoreKey, Timestamp, TtlStore};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// SQLite `TtlStore`.
///
/// Values live in `entries`, list items in `list_items` with their shared
/// expiry in `lists`. Expiry is compared in whole seconds. Expired rows are
/// ignored by reads and cleared by writes to the same key or by
/// `purge_expired`.
pub struct SqliteTtlStore {
    conn: Mutex<Connection>,
}

fn storage_err(context: &'static str) -> impl Fn(rusqlite::Error) -> CoreError {
    move |e| CoreError::Storage(format!("{}: {}", context, e))
}

fn secs(ts: Timestamp) -> i64 {
    ts.seconds_since_epoch as i64
}

fn now_secs() -> i64 {
    secs(Timestamp::now())
}

impl SqliteTtlStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open(path).map_err(storage_err("failed to open database"))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entries (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                expire_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS lists (
                key TEXT PRIMARY KEY NOT NULL,
                expire_at INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS list_items (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                value BLOB NOT NULL
            );
            CREATE INDEX IF NOT EXISTS list_items_key ON list_items (key, seq);",
        )
        .map_err(storage_err("failed to create tables"))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> CoreResult<Self> {
        Self::open(":memory:")
    }

    fn lock(&self) -> CoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Storage(format!("lock poisoned: {}", e)))
    }

    /// Delete every expired value and list. Returns the number of keys removed.
    pub fn purge_expired(&self) -> CoreResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage_err("begin failed"))?;
        let now = now_secs();
        let values = tx
            .execute("DELETE FROM entries WHERE expire_at <= ?1", params![now])
            .map_err(storage_err("purge failed"))?;
        tx.execute(
            "DELETE FROM list_items WHERE key IN (SELECT key FROM lists WHERE expire_at <= ?1)",
            params![now],
        )
        .map_err(storage_err("purge failed"))?;
        let lists = tx
            .execute("DELETE FROM lists WHERE expire_at <= ?1", params![now])
            .map_err(storage_err("purge failed"))?;
        tx.commit().map_err(storage_err("commit failed"))?;
        if values + lists > 0 {
            debug!(purged = values + lists, "purged expired entries");
        }
        Ok(values + lists)
    }
}

/// Expiry of the list at `key`, dropping it first if it is no longer live.
fn live_list_expiry(tx: &Transaction<'_>, key: &StoreKey) -> CoreResult<Option<i64>> {
    let expire_at: Option<i64> = tx
        .query_row(
            "SELECT expire_at FROM lists WHERE key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err("query failed"))?;

    match expire_at {
        Some(at) if at > now_secs() => Ok(Some(at)),
        Some(_) => {
            clear_list(tx, key)?;
            Ok(None)
        }
        None => Ok(None),
    }
}

fn clear_list(tx: &Transaction<'_>, key: &StoreKey) -> CoreResult<()> {
    tx.execute("DELETE FROM list_items WHERE key = ?1", params![key.as_str()])
        .map_err(storage_err("delete failed"))?;
    tx.execute("DELETE FROM lists WHERE key = ?1", params![key.as_str()])
        .map_err(storage_err("delete failed"))?;
    Ok(())
}

fn append(tx: &Transaction<'_>, key: &StoreKey, value: &[u8], expire_at: Timestamp) -> CoreResult<usize> {
    tx.execute(
        "INSERT INTO lists (key, expire_at) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET expire_at = excluded.expire_at",
        params![key.as_str(), secs(expire_at)],
    )
    .map_err(storage_err("insert failed"))?;
    tx.execute(
        "INSERT INTO list_items (key, value) VALUES (?1, ?2)",
        params![key.as_str(), value],
    )
    .map_err(storage_err("insert failed"))?;
    let len: i64 = tx
        .query_row(
            "SELECT COUNT(*) FROM list_items WHERE key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )
        .map_err(storage_err("count failed"))?;
    Ok(len as usize)
}

impl TtlStore for SqliteTtlStore {
    fn put(&self, key: &StoreKey, value: &[u8], expire_at: Timestamp) -> CoreResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO entries (key, value, expire_at) VALUES (?1, ?2, ?3)",
            params![key.as_str(), value, secs(expire_at)],
        )
        .map_err(storage_err("insert failed"))?;
        Ok(())
    }

    fn get(&self, key: &StoreKey) -> CoreResult<Option<Vec<u8>>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM entries WHERE key = ?1 AND expire_at > ?2",
            params![key.as_str(), now_secs()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err("query failed"))
    }

    fn delete(&self, key: &StoreKey) -> CoreResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage_err("begin failed"))?;
        let live_value = tx
            .execute(
                "DELETE FROM entries WHERE key = ?1 AND expire_at > ?2",
                params![key.as_str(), now_secs()],
            )
            .map_err(storage_err("delete failed"))?
            > 0;
        tx.execute("DELETE FROM entries WHERE key = ?1", params![key.as_str()])
            .map_err(storage_err("delete failed"))?;
        let live_list = live_list_expiry(&tx, key)?.is_some();
        clear_list(&tx, key)?;
        tx.commit().map_err(storage_err("commit failed"))?;
        Ok(live_value || live_list)
    }

    fn push(&self, key: &StoreKey, value: &[u8], expire_at: Timestamp) -> CoreResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage_err("begin failed"))?;
        live_list_expiry(&tx, key)?;
        let len = append(&tx, key, value, expire_at)?;
        tx.commit().map_err(storage_err("commit failed"))?;
        Ok(len)
    }

    fn push_if_empty(
        &self,
        key: &StoreKey,
        value: &[u8],
        expire_at: Timestamp,
    ) -> CoreResult<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(storage_err("begin failed"))?;
        if live_list_expiry(&tx, key)?.is_some() {
            return Ok(false);
        }
        append(&tx, key, value, expire_at)?;
        tx.commit().map_err(storage_err("commit failed"))?;
        Ok(true)
    }

    fn list(&self, key: &StoreKey) -> CoreResult<Vec<Vec<u8>>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT i.value FROM list_items i JOIN lists l ON l.key = i.key
                 WHERE i.key = ?1 AND l.expire_at > ?2 ORDER BY i.seq",
            )
            .map_err(storage_err("prepare failed"))?;
        let rows = stmt
            .query_map(params![key.as_str(), now_secs()], |row| row.get(0))
            .map_err(storage_err("query failed"))?;
        rows.collect::<Result<Vec<Vec<u8>>, _>>()
            .map_err(storage_err("row read failed"))
    }
}
