use anyhow::Context;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

use super::entry_size;
use crate::application::ports::KeyValueStorePort;
use crate::domain::errors::{DomainError, DomainResult};

/// Almacén clave-valor en un único fichero JSON (`{"clave": "valor"}`).
/// Cada lectura va al disco, así lo que escriba otro proceso se ve en la siguiente.
pub struct JsonFileStore {
    path: PathBuf,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self { path: path.into(), capacity, write_lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> DomainResult<BTreeMap<String, String>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(DomainError::OperationFailed(format!("{}: {e}", self.path.display()))),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|e| DomainError::StorageCorrupt(format!("{}: {e}", self.path.display())))
    }

    /// Escritura atómica: fichero temporal + rename.
    fn write_map(&self, map: &BTreeMap<String, String>) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creando {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(map)?).with_context(|| format!("escribiendo {}", tmp.display()))?;
        fs::rename(&tmp, &self.path).with_context(|| format!("renombrando a {}", self.path.display()))?;
        Ok(())
    }
}

impl KeyValueStorePort for JsonFileStore {
    fn get(&self, key: &str) -> DomainResult<Option<String>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> DomainResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DomainError::OperationFailed("Lock del almacén fallido".into()))?;

        let mut map = match self.read_map() {
            Ok(map) => map,
            Err(DomainError::StorageCorrupt(msg)) => {
                warn!("⚠️ Almacén corrupto, se reescribe desde cero: {}", msg);
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };

        let others: usize = map
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_size(k, v))
            .sum();
        let needed = others + entry_size(key, value);
        if needed > self.capacity {
            return Err(DomainError::StorageFull(format!("{needed} bytes > {} bytes", self.capacity)));
        }

        map.insert(key.to_string(), value.to_string());
        self.write_map(&map).map_err(|e| DomainError::OperationFailed(format!("{e:#}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        JsonFileStore::new(&path, 1024).set("k", "[1,2]").unwrap();

        let reopened = JsonFileStore::new(&path, 1024);
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("[1,2]"));
        assert_eq!(reopened.get("other").unwrap(), None);
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/none.json"), 1024);
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn corrupt_file_is_reported_then_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonFileStore::new(&path, 1024);

        assert!(matches!(store.get("k"), Err(DomainError::StorageCorrupt(_))));
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn overflow_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store.json"), 16);
        store.set("k", "small").unwrap();
        let err = store.set("k", "a value that does not fit").unwrap_err();
        assert!(matches!(err, DomainError::StorageFull(_)));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("small"));
    }
}
