//! Journal of permit-relay attempts
//!
//! Every relay is recorded before its first broadcast. A permit is keyed by
//! (chain, token, owner, nonce, deadline) and can be relayed only once.
//! Attempts where the permit landed but the transfer did not stay `partial`
//! until an operator resolves them.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use alloy::primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayStatus {
    Pending,
    Completed,
    Partial,
    Failed,
    Resolved,
}

impl RelayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayStatus::Pending => "pending",
            RelayStatus::Completed => "completed",
            RelayStatus::Partial => "partial",
            RelayStatus::Failed => "failed",
            RelayStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelayStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(RelayStatus::Pending),
            "completed" => Ok(RelayStatus::Completed),
            "partial" => Ok(RelayStatus::Partial),
            "failed" => Ok(RelayStatus::Failed),
            "resolved" => Ok(RelayStatus::Resolved),
            other => bail!("unknown relay status: {}", other),
        }
    }
}

/// Identity and amounts of a permit about to be relayed
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub chain_id: u64,
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub recipient: Address,
    pub value: U256,
    pub nonce: U256,
    pub deadline: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RelayAttempt {
    pub id: i64,
    pub chain_id: u64,
    pub token: String,
    pub owner: String,
    pub spender: String,
    pub recipient: String,
    pub value: String,
    pub nonce: String,
    pub deadline: u64,
    pub status: RelayStatus,
    pub permit_tx: Option<String>,
    pub transfer_tx: Option<String>,
    pub error: Option<String>,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// SQLite-backed relay journal
#[derive(Debug)]
pub struct RelayJournal {
    conn: Mutex<Connection>,
}

const COLUMNS: &str = "id, chain_id, token, owner, spender, recipient, value, nonce, deadline,
                       status, permit_tx, transfer_tx, error, note, created_at, updated_at";

impl RelayJournal {
    /// Open or create the journal database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let conn = Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        let journal = Self {
            conn: Mutex::new(conn),
        };
        journal.init()?;
        Ok(journal)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init(&self) -> Result<()> {
        self.conn().execute_batch(
            "
            CREATE TABLE IF NOT EXISTS relay_attempts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                chain_id    INTEGER NOT NULL,
                token       TEXT NOT NULL,
                owner       TEXT NOT NULL,
                spender     TEXT NOT NULL,
                recipient   TEXT NOT NULL,
                value       TEXT NOT NULL,
                nonce       TEXT NOT NULL,
                deadline    INTEGER NOT NULL,
                status      TEXT NOT NULL,
                permit_tx   TEXT,
                transfer_tx TEXT,
                error       TEXT,
                note        TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE (chain_id, token, owner, nonce, deadline)
            );

            CREATE INDEX IF NOT EXISTS idx_relay_status ON relay_attempts(status);
            ",
        )?;
        Ok(())
    }

    /// Whether this exact permit has been recorded before
    pub fn contains(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        nonce: U256,
        deadline: u64,
    ) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM relay_attempts
             WHERE chain_id = ?1 AND token = ?2 AND owner = ?3 AND nonce = ?4 AND deadline = ?5",
            params![
                chain_id as i64,
                addr(token),
                addr(owner),
                nonce.to_string(),
                deadline as i64
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record a new attempt as `pending`, returning its id
    pub fn begin(&self, attempt: &NewAttempt) -> Result<i64> {
        let now = now();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO relay_attempts(chain_id, token, owner, spender, recipient, value, nonce,
                                        deadline, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                attempt.chain_id as i64,
                addr(attempt.token),
                addr(attempt.owner),
                addr(attempt.spender),
                addr(attempt.recipient),
                attempt.value.to_string(),
                attempt.nonce.to_string(),
                attempt.deadline as i64,
                RelayStatus::Pending.as_str(),
                now,
            ],
        )
        .context("permit already recorded in the relay journal")?;
        Ok(conn.last_insert_rowid())
    }

    pub fn record_permit(&self, id: i64, permit_tx: &str) -> Result<()> {
        self.update(
            id,
            "UPDATE relay_attempts SET permit_tx = ?2, updated_at = ?3 WHERE id = ?1",
            permit_tx,
        )
    }

    pub fn complete(&self, id: i64, transfer_tx: &str) -> Result<()> {
        self.update(
            id,
            "UPDATE relay_attempts SET status = 'completed', transfer_tx = ?2, error = NULL,
                                       updated_at = ?3 WHERE id = ?1",
            transfer_tx,
        )
    }

    pub fn mark_partial(&self, id: i64, error: &str) -> Result<()> {
        self.update(
            id,
            "UPDATE relay_attempts SET status = 'partial', error = ?2, updated_at = ?3 WHERE id = ?1",
            error,
        )
    }

    pub fn mark_failed(&self, id: i64, error: &str) -> Result<()> {
        self.update(
            id,
            "UPDATE relay_attempts SET status = 'failed', error = ?2, updated_at = ?3 WHERE id = ?1",
            error,
        )
    }

    /// Close a partial attempt after manual follow-up; false if it was not partial
    pub fn resolve(&self, id: i64, note: &str) -> Result<bool> {
        let changed = self.conn().execute(
            "UPDATE relay_attempts SET status = 'resolved', note = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'partial'",
            params![id, note, now()],
        )?;
        Ok(changed > 0)
    }

    pub fn get(&self, id: i64) -> Result<Option<RelayAttempt>> {
        let conn = self.conn();
        let sql = format!("SELECT {} FROM relay_attempts WHERE id = ?1", COLUMNS);
        let row = conn
            .query_row(&sql, params![id], read_attempt)
            .optional()?;
        row.transpose()
    }

    /// Attempts newest first, optionally restricted to one status
    pub fn list(&self, status: Option<RelayStatus>) -> Result<Vec<RelayAttempt>> {
        let conn = self.conn();
        let sql = format!(
            "SELECT {} FROM relay_attempts WHERE (?1 IS NULL OR status = ?1) ORDER BY id DESC",
            COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params![status.map(|s| s.as_str())])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_attempt(row)??);
        }
        Ok(out)
    }

    fn update(&self, id: i64, sql: &str, value: &str) -> Result<()> {
        let changed = self.conn().execute(sql, params![id, value, now()])?;
        if changed == 0 {
            bail!("no relay attempt with id {}", id);
        }
        Ok(())
    }
}

/// Row mapper; the inner result carries status parse failures
fn read_attempt(row: &Row<'_>) -> rusqlite::Result<Result<RelayAttempt>> {
    let status: String = row.get(9)?;
    let status = match status.parse::<RelayStatus>() {
        Ok(status) => status,
        Err(err) => return Ok(Err(err)),
    };
    let chain_id: i64 = row.get(1)?;
    let deadline: i64 = row.get(8)?;
    Ok(Ok(RelayAttempt {
        id: row.get(0)?,
        chain_id: chain_id as u64,
        token: row.get(2)?,
        owner: row.get(3)?,
        spender: row.get(4)?,
        recipient: row.get(5)?,
        value: row.get(6)?,
        nonce: row.get(7)?,
        deadline: deadline as u64,
        status,
        permit_tx: row.get(10)?,
        transfer_tx: row.get(11)?,
        error: row.get(12)?,
        note: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    }))
}

fn addr(address: Address) -> String {
    format!("{:#x}", address)
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
