use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::{
    camera::{CameraConstraints, Frame},
    detection::Detection,
    errors::DomainResult,
};

/// Fuente de frames en vivo obtenida de [`CameraPort::acquire`].
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> DomainResult<Frame>;
    /// Libera el dispositivo. Debe ser idempotente.
    fn release(&mut self);
}

#[async_trait]
pub trait CameraPort: Send + Sync {
    async fn acquire(&self, constraints: &CameraConstraints) -> DomainResult<Box<dyn FrameSource>>;
}

#[async_trait]
pub trait DetectorPort: Send + Sync {
    async fn detect(&self, frame: &Frame) -> DomainResult<Vec<Detection>>;
}

#[async_trait]
pub trait ModelLoaderPort: Send + Sync {
    async fn load(&self) -> DomainResult<Arc<dyn DetectorPort>>;
}

/// Almacén clave-valor acotado. `set` falla con `StorageFull` al superar la capacidad.
pub trait KeyValueStorePort: Send + Sync {
    fn get(&self, key: &str) -> DomainResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> DomainResult<()>;
}
