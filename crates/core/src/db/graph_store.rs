use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::{BuildInfo, DbError, DbResult, CURRENT_SCHEMA_VERSION, MIN_SUPPORTED_SCHEMA_VERSION};
use crate::model::{edge_count, CallGraph, FunctionNode};

/// SQLite-backed call graph.
///
/// Every save replaces the whole graph inside one transaction, so the file
/// always holds either the previous graph or the new one.
#[derive(Debug)]
pub struct GraphStore {
    conn: Connection,
}

impl GraphStore {
    /// Open (or create) a graph database at the given path and ensure the schema exists.
    pub fn open(path: &Path) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        apply_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Expose the underlying connection for advanced callers.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Replace the stored graph. Clears any stored build info.
    pub fn save(&mut self, graph: &CallGraph) -> DbResult<()> {
        self.save_with_info(graph, None)
    }

    /// Replace the stored graph and its build info in one transaction.
    ///
    /// On any failure the transaction rolls back and the previous contents
    /// stay in place.
    pub fn save_with_info(&mut self, graph: &CallGraph, info: Option<&BuildInfo>) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM calls", [])?;
        tx.execute("DELETE FROM functions", [])?;
        tx.execute("DELETE FROM build_info", [])?;

        {
            let mut insert_fn = tx.prepare(
                "INSERT INTO functions (name, signature, definition) VALUES (?1, ?2, ?3)",
            )?;
            for (name, node) in graph {
                insert_fn
                    .execute(params![name, node.signature, node.definition])
                    .map_err(|source| DbError::InsertFunction { name: name.clone(), source })?;
            }

            let mut insert_call =
                tx.prepare("INSERT OR IGNORE INTO calls (caller, callee) VALUES (?1, ?2)")?;
            for (caller, node) in graph {
                for callee in &node.callees {
                    insert_call.execute(params![caller, callee]).map_err(|source| {
                        DbError::InsertCall {
                            caller: caller.clone(),
                            callee: callee.clone(),
                            source,
                        }
                    })?;
                }
            }
        }

        if let Some(info) = info {
            tx.execute(
                r#"
                INSERT INTO build_info (id, built_at, mode, functions, edges)
                VALUES (1, ?1, ?2, ?3, ?4)
                "#,
                params![info.built_at, info.mode, info.functions, info.edges],
            )?;
        }

        tx.commit()?;
        debug!(functions = graph.len(), edges = edge_count(graph), "graph saved");
        Ok(())
    }

    /// Read the whole graph back, callees in insertion order.
    pub fn load(&self) -> DbResult<CallGraph> {
        let mut graph = CallGraph::new();

        let mut stmt =
            self.conn.prepare("SELECT name, signature, definition FROM functions ORDER BY rowid")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?;
        for row in rows {
            let (name, signature, definition) = row?;
            graph.insert(name, FunctionNode::new(signature, definition));
        }

        let mut stmt = self.conn.prepare("SELECT caller, callee FROM calls ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (caller, callee) = row?;
            match graph.get_mut(&caller) {
                Some(node) => node.callees.push(callee),
                None => warn!(%caller, %callee, "edge with unknown caller, skipping"),
            }
        }
        Ok(graph)
    }

    /// One function with its callees, or `None` if it is not stored.
    pub fn function(&self, name: &str) -> DbResult<Option<FunctionNode>> {
        let node = self
            .conn
            .query_row(
                "SELECT signature, definition FROM functions WHERE name = ?1",
                params![name],
                |row| Ok(FunctionNode::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        let Some(mut node) = node else { return Ok(None) };

        let mut stmt =
            self.conn.prepare("SELECT callee FROM calls WHERE caller = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map(params![name], |row| row.get::<_, String>(0))?;
        for row in rows {
            node.callees.push(row?);
        }
        Ok(Some(node))
    }

    /// Names of the stored functions that call `name`, sorted.
    pub fn callers(&self, name: &str) -> DbResult<Vec<String>> {
        let mut stmt =
            self.conn.prepare("SELECT caller FROM calls WHERE callee = ?1 ORDER BY caller")?;
        let rows = stmt.query_map(params![name], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn build_info(&self) -> DbResult<Option<BuildInfo>> {
        let info = self
            .conn
            .query_row(
                "SELECT built_at, mode, functions, edges FROM build_info WHERE id = 1",
                [],
                |row| {
                    Ok(BuildInfo {
                        built_at: row.get(0)?,
                        mode: row.get(1)?,
                        functions: row.get(2)?,
                        edges: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    /// Release the connection.
    pub fn close(self) -> DbResult<()> {
        self.conn.close().map_err(|(_, err)| DbError::Sql(err))
    }
}

/// Apply schema migrations to bring the database to the latest version.
///
/// We use `PRAGMA user_version` as the schema version indicator.
///
/// Version map:
/// - 0: no schema
/// - 1: functions, calls, build_info
fn apply_migrations(conn: &Connection) -> DbResult<()> {
    let current_version = current_schema_version(conn)?;

    if current_version > CURRENT_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current_version,
            min_supported: MIN_SUPPORTED_SCHEMA_VERSION,
            max_supported: CURRENT_SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        conn.execute_batch(
            r#"
            BEGIN;
            CREATE TABLE IF NOT EXISTS functions (
                name       TEXT PRIMARY KEY,
                signature  TEXT NOT NULL,
                definition TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS calls (
                caller TEXT NOT NULL REFERENCES functions(name) ON DELETE CASCADE,
                callee TEXT NOT NULL REFERENCES functions(name) ON DELETE CASCADE,
                PRIMARY KEY (caller, callee)
            );
            CREATE INDEX IF NOT EXISTS calls_by_callee ON calls(callee);

            CREATE TABLE IF NOT EXISTS build_info (
                id        INTEGER PRIMARY KEY CHECK (id = 1),
                built_at  TEXT NOT NULL,
                mode      TEXT NOT NULL,
                functions INTEGER NOT NULL,
                edges     INTEGER NOT NULL
            );

            PRAGMA user_version = 1;
            COMMIT;
            "#,
        )?;
    }

    Ok(())
}

/// Read the SQLite schema version from `PRAGMA user_version`.
fn current_schema_version(conn: &Connection) -> DbResult<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(version)
}
