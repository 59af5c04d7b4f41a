//! Sidecar key/value store for per-shard internal keys (`seq`,
//! `mappingVersion`, `md5sum:<docID>`). The file lives inside the shard
//! directory so every snapshot of the shard carries its cursor state.

use crate::error::Result;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const INTERNAL_FILE: &str = "internal_keys.json";

pub struct InternalStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl InternalStore {
    pub fn open(shard_dir: &Path) -> Result<Self> {
        let path = shard_dir.join(INTERNAL_FILE);
        let entries = if path.exists() {
            serde_json::from_slice(&std::fs::read(&path)?)?
        } else {
            HashMap::new()
        };
        Ok(InternalStore {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn set_get_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = InternalStore::open(dir.path()).unwrap();
            assert_eq!(store.get("seq"), None);
            store.set("seq", "42").unwrap();
            store.set("md5sum:f1", "abc").unwrap();
        }
        let store = InternalStore::open(dir.path()).unwrap();
        assert_eq!(store.get("seq").as_deref(), Some("42"));
        assert_eq!(store.get("md5sum:f1").as_deref(), Some("abc"));
        assert_eq!(store.get("md5sum:f2"), None);
    }
}
