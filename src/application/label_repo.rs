use std::sync::Arc;
use tracing::warn;

use crate::application::ports::KeyValueStorePort;
use crate::domain::{
    errors::{DomainError, DomainResult},
    labels::{parse_collection, LabeledObject},
};

/// Acceso tipado a la colección persistida bajo una única clave.
#[derive(Clone)]
pub struct LabelRepository {
    store: Arc<dyn KeyValueStorePort>,
    key: String,
}

impl LabelRepository {
    pub fn new(store: Arc<dyn KeyValueStorePort>, key: impl Into<String>) -> Self {
        Self { store, key: key.into() }
    }

    /// Lectura canónica. Valor ausente, ilegible o corrupto -> colección vacía.
    pub fn load(&self) -> Vec<LabeledObject> {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("⚠️ No se pudo leer '{}': {}", self.key, e);
                return Vec::new();
            }
        };
        match parse_collection(&raw) {
            Ok(c) => c,
            Err(e) => {
                let err = DomainError::StorageCorrupt(e.to_string());
                warn!("⚠️ {} (clave '{}'), se usa colección vacía", err, self.key);
                Vec::new()
            }
        }
    }

    pub fn persist(&self, collection: &[LabeledObject]) -> DomainResult<()> {
        let json = serde_json::to_string(collection)
            .map_err(|e| DomainError::OperationFailed(format!("Serialización fallida: {e}")))?;
        self.store.set(&self.key, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::memory::MemoryStore;

    #[test]
    fn missing_and_corrupt_values_degrade_to_empty() {
        let store = Arc::new(MemoryStore::new(1024));
        let repo = LabelRepository::new(store.clone(), "k");
        assert!(repo.load().is_empty());

        store.set("k", "{oops").unwrap();
        assert!(repo.load().is_empty());

        store.set("k", r#"{"class":"cup"}"#).unwrap();
        assert!(repo.load().is_empty());
    }

    #[test]
    fn persist_then_load_returns_collection() {
        let repo = LabelRepository::new(Arc::new(MemoryStore::new(1024)), "k");
        let c = vec![LabeledObject { class: "cup".into(), label: "My Mug".into(), bbox: None, score: Some(0.5) }];
        repo.persist(&c).unwrap();
        assert_eq!(repo.load(), c);
    }

    #[test]
    fn persist_surfaces_storage_full() {
        let repo = LabelRepository::new(Arc::new(MemoryStore::new(8)), "k");
        let c = vec![LabeledObject { class: "cup".into(), label: "My Mug".into(), bbox: None, score: None }];
        assert!(matches!(repo.persist(&c), Err(DomainError::StorageFull(_))));
    }
}
