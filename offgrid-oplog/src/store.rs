//! SQLite persistence for the log, the clock mark, and the tree.
//!
//! Everything here is reconstructible: the `mutations` table is the
//! authority, and the cached tree blob is validated against it on load.

use crate::error::{OplogError, OplogResult};
use offgrid_merkle::MerkleTree;
use offgrid_types::{MutationRecord, NodeId, Timestamp};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};

const META_NODE_ID: &str = "node_id";
const META_LAST_TIMESTAMP: &str = "last_timestamp";
const META_MERKLE: &str = "merkle";

/// Persistent store for one replica's local state.
pub struct LogStore {
    conn: Arc<Mutex<Connection>>,
}

impl LogStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> OplogResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| OplogError::Storage(format!("failed to open log store: {e}")))?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> OplogResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| OplogError::Storage(format!("failed to open in-memory store: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> OplogResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> OplogResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS mutations (
                ts TEXT PRIMARY KEY,
                record TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| OplogError::Storage(format!("failed to init schema: {e}")))?;
        Ok(())
    }

    // ── Mutation log ─────────────────────────────────────────────

    /// Appends a record. Idempotent: re-appending the same identity is a
    /// no-op, never an overwrite.
    pub fn append(&self, record: &MutationRecord) -> OplogResult<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| OplogError::Storage(format!("failed to encode record: {e}")))?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO mutations (ts, record) VALUES (?1, ?2)",
            params![record.timestamp.to_string(), json],
        )?;
        Ok(())
    }

    /// Loads every record in timestamp order.
    ///
    /// An unreadable row is corruption of the authoritative structure and
    /// is surfaced, not skipped.
    pub fn load_records(&self) -> OplogResult<Vec<MutationRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT record FROM mutations ORDER BY ts")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            let json = row?;
            let record: MutationRecord = serde_json::from_str(&json)
                .map_err(|e| OplogError::Corruption(format!("unreadable log record: {e}")))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Number of persisted records.
    pub fn record_count(&self) -> OplogResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM mutations", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ── Clock and identity ───────────────────────────────────────

    /// Persists the clock's high-water mark.
    pub fn save_clock(&self, last: &Timestamp) -> OplogResult<()> {
        self.put_meta(META_LAST_TIMESTAMP, &last.to_string())
    }

    /// Loads the clock's high-water mark, if one was saved.
    pub fn load_clock(&self) -> OplogResult<Option<Timestamp>> {
        match self.get_meta(META_LAST_TIMESTAMP)? {
            Some(s) => s
                .parse::<Timestamp>()
                .map(Some)
                .map_err(|e| OplogError::Corruption(format!("unreadable clock mark: {e}"))),
            None => Ok(None),
        }
    }

    /// Persists this replica's node id.
    pub fn save_node_id(&self, node: &NodeId) -> OplogResult<()> {
        self.put_meta(META_NODE_ID, &node.to_string())
    }

    /// Loads this replica's node id, if one was saved.
    pub fn load_node_id(&self) -> OplogResult<Option<NodeId>> {
        match self.get_meta(META_NODE_ID)? {
            Some(s) => NodeId::parse(&s)
                .map(Some)
                .map_err(|e| OplogError::Corruption(format!("unreadable node id: {e}"))),
            None => Ok(None),
        }
    }

    // ── Merkle cache ─────────────────────────────────────────────

    /// Persists the tree (leaves only).
    pub fn save_merkle(&self, tree: &MerkleTree) -> OplogResult<()> {
        let json = serde_json::to_string(tree)
            .map_err(|e| OplogError::Storage(format!("failed to encode tree: {e}")))?;
        self.put_meta(META_MERKLE, &json)
    }

    /// Loads the persisted tree.
    ///
    /// Returns `Err(Corruption)` when a blob exists but cannot be decoded;
    /// the caller recovers by rebuilding from the log.
    pub fn load_merkle(&self) -> OplogResult<Option<MerkleTree>> {
        match self.get_meta(META_MERKLE)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| OplogError::Corruption(format!("unreadable merkle cache: {e}"))),
            None => Ok(None),
        }
    }

    // ── Reset ────────────────────────────────────────────────────

    /// Erases every persisted row. Irreversible.
    pub fn wipe(&self) -> OplogResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch("DELETE FROM mutations; DELETE FROM meta;")
            .map_err(|e| OplogError::Storage(format!("failed to wipe store: {e}")))?;
        Ok(())
    }

    fn put_meta(&self, key: &str, value: &str) -> OplogResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> OplogResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }
}
