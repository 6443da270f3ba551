use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::entry_size;
use crate::application::ports::KeyValueStorePort;
use crate::domain::errors::{DomainError, DomainResult};

/// Almacén en memoria con capacidad acotada. Útil para pruebas y para
/// ejecutar sin disco.
pub struct MemoryStore {
    capacity: usize,
    entries: Mutex<HashMap<String, String>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: Mutex::new(HashMap::new()), fail_writes: Mutex::new(false) }
    }

    /// Fuerza que todas las escrituras fallen como si el almacén estuviera lleno.
    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }
}

impl KeyValueStorePort for MemoryStore {
    fn get(&self, key: &str) -> DomainResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| DomainError::OperationFailed("Lock del almacén fallido".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> DomainResult<()> {
        if *self.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(DomainError::StorageFull(format!("escritura rechazada para '{key}'")));
        }
        let mut entries = self.entries.lock().map_err(|_| DomainError::OperationFailed("Lock del almacén fallido".into()))?;
        let others: usize = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| entry_size(k, v))
            .sum();
        let needed = others + entry_size(key, value);
        if needed > self.capacity {
            return Err(DomainError::StorageFull(format!("{needed} bytes > {} bytes", self.capacity)));
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
