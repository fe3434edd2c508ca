//! Durable local storage for session and ledger state
//!
//! The session document carries token, expiry, and operator identity as a
//! single JSON file, so the group of values is written and erased together.
//! File writes go through a temp-file-then-rename step; a torn write never
//! leaves a partially updated document behind.

use crate::types::{InventoryItem, Session};
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

const SESSION_FILE: &str = "session.json";

/// Durable store for the active session.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<Session>>;
    fn save(&self, session: &Session) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Default on-disk location for client state.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("barinv"))
        .unwrap_or_else(|| PathBuf::from("./barinv_data"))
}

/// File-backed session store rooted at a data directory.
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        let path = self.session_path();
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("read {}: {}", path.display(), e)))?;
        let session = serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("parse {}: {}", path.display(), e)))?;
        Ok(Some(session))
    }

    fn save(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| Error::Storage(format!("serialize session: {e}")))?;
        write_atomic(&self.dir, &self.session_path(), &json)?;
        tracing::debug!(expires_at = %session.expires_at, "session persisted");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let path = self.session_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("remove {}: {}", path.display(), e))),
        }
    }
}

/// In-memory session store for tests; can simulate write failures.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: std::sync::Mutex<Option<Session>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `save` calls fail with a storage error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }
}

impl MemorySessionStore {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<Session>>> {
        self.inner
            .lock()
            .map_err(|_| Error::Storage("session store lock poisoned".to_string()))
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self.lock()?.clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::Storage("simulated write failure".to_string()));
        }
        *self.lock()? = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.lock()? = None;
        Ok(())
    }
}

/// File-backed ledger persistence, one document per inventory id. Loaded
/// when a session starts, saved after each mutation, deleted only on an
/// explicit clear.
pub struct LedgerStore {
    dir: PathBuf,
}

impl LedgerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn ledger_path(&self, inventory_id: &str) -> PathBuf {
        let safe: String = inventory_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        self.dir.join(format!("ledger_{safe}.json"))
    }

    pub fn load(&self, inventory_id: &str) -> Result<Vec<InventoryItem>> {
        let path = self.ledger_path(inventory_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| Error::Storage(format!("read {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Storage(format!("parse {}: {}", path.display(), e)))
    }

    pub fn save(&self, inventory_id: &str, items: &[InventoryItem]) -> Result<()> {
        let json = serde_json::to_string_pretty(items)
            .map_err(|e| Error::Storage(format!("serialize ledger: {e}")))?;
        write_atomic(&self.dir, &self.ledger_path(inventory_id), &json)
    }

    pub fn delete(&self, inventory_id: &str) -> Result<()> {
        let path = self.ledger_path(inventory_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("remove {}: {}", path.display(), e))),
        }
    }
}

/// Write `content` to `path` via a temp file in `dir` plus rename.
fn write_atomic(dir: &Path, path: &Path, content: &str) -> Result<()> {
    fs::create_dir_all(dir)
        .map_err(|e| Error::Storage(format!("create {}: {}", dir.display(), e)))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)
        .map_err(|e| Error::Storage(format!("write {}: {}", tmp.display(), e)))?;
    fs::rename(&tmp, path)
        .map_err(|e| Error::Storage(format!("rename {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperatorProfile;
    use chrono::Utc;

    fn session() -> Session {
        Session::create(
            "tok-abc".into(),
            3600,
            OperatorProfile {
                operator_id: "op-1".into(),
                user_name: "Tester".into(),
                inventory_id: "inv-9".into(),
                news_message: None,
                news_color: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn item(ean: &str, quantity: u32) -> InventoryItem {
        InventoryItem {
            ean: ean.into(),
            name: format!("product {ean}"),
            quantity,
            volume: None,
            alcohol_content: None,
            scan_id: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        assert!(store.load().unwrap().is_none());

        let original = session();
        store.save(&original).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, original);

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        // Clearing an already-empty store is fine
        store.clear().unwrap();
    }

    #[test]
    fn save_overwrites_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        let first = session();
        store.save(&first).unwrap();
        let renewed = first.renewed("tok-new".into(), Utc::now());
        store.save(&renewed).unwrap();

        assert_eq!(store.load().unwrap().unwrap().token, "tok-new");
    }

    #[test]
    fn memory_store_simulated_failure() {
        let store = MemorySessionStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.save(&session()),
            Err(Error::Storage(_))
        ));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn memory_store_reports_poisoned_lock_as_storage_error() {
        let store = std::sync::Arc::new(MemorySessionStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.inner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(store.load(), Err(Error::Storage(_))));
        assert!(matches!(store.save(&session()), Err(Error::Storage(_))));
        assert!(matches!(store.clear(), Err(Error::Storage(_))));
    }

    #[test]
    fn ledger_store_roundtrip_per_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path());

        assert!(store.load("inv-1").unwrap().is_empty());

        let items = vec![item("12345678", 3), item("4006381333931", 12)];
        store.save("inv-1", &items).unwrap();
        store.save("inv-2", &[item("87654321", 1)]).unwrap();

        assert_eq!(store.load("inv-1").unwrap(), items);
        assert_eq!(store.load("inv-2").unwrap().len(), 1);

        store.delete("inv-1").unwrap();
        assert!(store.load("inv-1").unwrap().is_empty());
        // inv-2 untouched
        assert_eq!(store.load("inv-2").unwrap().len(), 1);
    }

    #[test]
    fn ledger_path_sanitizes_inventory_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = LedgerStore::new(dir.path());
        store.save("../evil/id", &[item("12345678", 1)]).unwrap();
        assert_eq!(store.load("../evil/id").unwrap().len(), 1);
        // Nothing escaped the data directory
        assert!(dir.path().join("ledger____evil_id.json").exists());
    }
}
