//! On-disk ABI cache so repeated introspection skips the indexer and Sourcify

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

#[derive(Debug, Clone)]
pub struct CachedAbi {
    pub chain_id: u64,
    pub address: String,
    pub abi_json: String,
    pub contract_name: Option<String>,
    /// Set when `abi_json` belongs to the implementation behind a proxy
    pub implementation: Option<String>,
    /// RFC 3339
    pub cached_at: String,
}

/// ABIs keyed by `(chain id, lowercase address)`
#[derive(Debug)]
pub struct AbiCache {
    conn: Mutex<Connection>,
}

fn key(address: &str) -> String {
    address.trim().to_lowercase()
}

impl AbiCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("open ABI cache {}", path.display()))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS contract_abis (
                chain_id       INTEGER NOT NULL,
                address        TEXT NOT NULL,
                abi_json       TEXT NOT NULL,
                contract_name  TEXT,
                implementation TEXT,
                cached_at      TEXT NOT NULL,
                PRIMARY KEY (chain_id, address)
            );",
        )
        .context("create ABI cache schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace the entry for `(chain_id, address)`
    pub fn save_abi(
        &self,
        chain_id: u64,
        address: &str,
        abi_json: &str,
        contract_name: Option<&str>,
        implementation: Option<&str>,
    ) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO contract_abis
                    (chain_id, address, abi_json, contract_name, implementation, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    chain_id as i64,
                    key(address),
                    abi_json,
                    contract_name,
                    implementation.map(key),
                    chrono::Utc::now().to_rfc3339(),
                ],
            )
            .with_context(|| format!("cache ABI for {}", address))?;
        Ok(())
    }

    pub fn get_abi(&self, chain_id: u64, address: &str) -> Result<Option<CachedAbi>> {
        self.conn()
            .query_row(
                "SELECT abi_json, contract_name, implementation, cached_at
                 FROM contract_abis WHERE chain_id = ?1 AND address = ?2",
                params![chain_id as i64, key(address)],
                |row| {
                    Ok(CachedAbi {
                        chain_id,
                        address: key(address),
                        abi_json: row.get(0)?,
                        contract_name: row.get(1)?,
                        implementation: row.get(2)?,
                        cached_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .context("read ABI cache")
    }

    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM contract_abis", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (tempfile::TempDir, AbiCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = AbiCache::open(&dir.path().join("nested").join("abi.sqlite3")).unwrap();
        (dir, cache)
    }

    #[test]
    fn test_lookup_ignores_address_case_and_other_chains() {
        let (_dir, cache) = open();
        assert!(cache.is_empty().unwrap());

        cache
            .save_abi(8217, "0xAbCdEf0000000000000000000000000000000001", "[]", Some("Vault"), None)
            .unwrap();

        let hit = cache
            .get_abi(8217, "0xabcdef0000000000000000000000000000000001")
            .unwrap()
            .unwrap();
        assert_eq!(hit.contract_name.as_deref(), Some("Vault"));
        assert!(hit.implementation.is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(&hit.cached_at).is_ok());

        assert!(cache
            .get_abi(1001, "0xabcdef0000000000000000000000000000000001")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_save_replaces_entry() {
        let (_dir, cache) = open();

        cache.save_abi(1, "0x01", "[]", None, None).unwrap();
        cache.save_abi(1, "0x01", "[]", Some("Proxy"), Some("0xIMPL")).unwrap();

        let entry = cache.get_abi(1, "0x01").unwrap().unwrap();
        assert_eq!(entry.contract_name.as_deref(), Some("Proxy"));
        assert_eq!(entry.implementation.as_deref(), Some("0ximpl"));
        assert_eq!(cache.len().unwrap(), 1);
    }
}
