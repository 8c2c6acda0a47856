//! Cargo dashboard: a single aggregate summary, seeded once and served read-only.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Aggregate cargo counts shown on the dashboard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CargoSummary {
    pub total_cargo: i64,
    pub in_transit: i64,
    pub delivered: i64,
}

impl CargoSummary {
    /// Figures inserted by `cargodesk seed`.
    pub const SEED: Self = Self {
        total_cargo: 120,
        in_transit: 50,
        delivered: 70,
    };
}

// ── SQLite store ────────────────────────────────────────────────

pub struct DashboardStore {
    conn: Mutex<Connection>,
}

impl DashboardStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open dashboard DB: {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cargo_summaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                total_cargo INTEGER NOT NULL,
                in_transit INTEGER NOT NULL,
                delivered INTEGER NOT NULL
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a summary row. Returns its row id.
    pub fn insert(&self, summary: CargoSummary) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO cargo_summaries (total_cargo, in_transit, delivered)
             VALUES (?1, ?2, ?3)",
            params![summary.total_cargo, summary.in_transit, summary.delivered],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// The oldest summary, if any has been seeded.
    pub fn first(&self) -> Result<Option<CargoSummary>> {
        let conn = self.conn.lock();
        let summary = conn
            .query_row(
                "SELECT total_cargo, in_transit, delivered
                 FROM cargo_summaries ORDER BY id ASC LIMIT 1",
                [],
                |row| {
                    Ok(CargoSummary {
                        total_cargo: row.get(0)?,
                        in_transit: row.get(1)?,
                        delivered: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(summary)
    }
}

/// Insert the default summary into the database at `db_path`.
pub fn seed(db_path: &Path) -> Result<CargoSummary> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
    }
    let store = DashboardStore::open(db_path)?;
    store.insert(CargoSummary::SEED)?;
    tracing::info!("Database seeded");
    Ok(CargoSummary::SEED)
}
