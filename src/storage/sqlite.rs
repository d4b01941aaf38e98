//! SQLite storage backend for ontograph

use super::traits::{OpenStore, SnapshotStore, StorageResult};
use crate::audit::AuditRecord;
use crate::canon::Entity;
use crate::store::CommittedTriple;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed snapshot store
///
/// One database file with tables for entities, triples, and the audit
/// trail. Structured fields live in `*_json` columns; the queryable
/// keys (ids, classes, predicates) get their own indexed columns.
/// Thread-safe via an internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS entities (
                id TEXT PRIMARY KEY,
                class TEXT NOT NULL,
                label TEXT NOT NULL,
                entity_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entities_class
                ON entities(class);

            CREATE TABLE IF NOT EXISTS triples (
                id TEXT PRIMARY KEY,
                subject TEXT NOT NULL,
                predicate TEXT NOT NULL,
                triple_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_triples_subject
                ON triples(subject);
            CREATE INDEX IF NOT EXISTS idx_triples_predicate
                ON triples(predicate);

            CREATE TABLE IF NOT EXISTS audit (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                at TEXT NOT NULL,
                record_json TEXT NOT NULL
            );

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let conn = self.conn.lock().expect("sqlite connection lock poisoned");
        f(&conn)
    }
}

impl SnapshotStore for SqliteStore {
    fn save_graph(&self, entities: &[Entity], triples: &[CommittedTriple]) -> StorageResult<()> {
        let mut conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM entities", [])?;
        tx.execute("DELETE FROM triples", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO entities (id, class, label, entity_json) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for entity in entities {
                stmt.execute(params![
                    entity.id.as_str(),
                    entity.class,
                    entity.label,
                    serde_json::to_string(entity)?,
                ])?;
            }
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO triples (id, subject, predicate, triple_json) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for triple in triples {
                stmt.execute(params![
                    triple.id.to_string(),
                    triple.subject.as_str(),
                    triple.predicate,
                    serde_json::to_string(triple)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_graph(&self) -> StorageResult<(Vec<Entity>, Vec<CommittedTriple>)> {
        self.with_conn(|conn| {
            let mut entities = Vec::new();
            let mut stmt = conn.prepare("SELECT entity_json FROM entities")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for json in rows {
                entities.push(serde_json::from_str(&json?)?);
            }

            let mut triples = Vec::new();
            let mut stmt = conn.prepare("SELECT triple_json FROM triples")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for json in rows {
                triples.push(serde_json::from_str(&json?)?);
            }
            Ok((entities, triples))
        })
    }

    fn append_audit(&self, records: &[AuditRecord]) -> StorageResult<()> {
        let mut conn = self.conn.lock().expect("sqlite connection lock poisoned");
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare("INSERT INTO audit (at, record_json) VALUES (?1, ?2)")?;
            for record in records {
                stmt.execute(params![
                    record.at.to_rfc3339(),
                    serde_json::to_string(record)?,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_audit(&self) -> StorageResult<Vec<AuditRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT record_json FROM audit ORDER BY seq ASC")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut records = Vec::new();
            for json in rows {
                records.push(serde_json::from_str(&json?)?);
            }
            Ok(records)
        })
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
