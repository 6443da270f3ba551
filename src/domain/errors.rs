use thiserror::Error;

/// Taxonomía de fallos de la aplicación.
/// Los adaptadores trabajan con `anyhow` internamente y traducen a estas variantes
/// en el borde del puerto.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Permiso de cámara denegado: {0}")]
    PermissionDenied(String),
    #[error("Cámara no disponible: {0}")]
    DeviceUnavailable(String),
    #[error("Error cargando el modelo: {0}")]
    LoadError(String),
    #[error("Error de inferencia: {0}")]
    InferenceError(String),
    #[error("Almacenamiento lleno: {0}")]
    StorageFull(String),
    #[error("Almacenamiento corrupto: {0}")]
    StorageCorrupt(String),
    #[error("No encontrado: {0}")]
    NotFound(String),
    #[error("Entrada inválida: {0}")]
    InvalidInput(String),
    #[error("Error de operación: {0}")]
    OperationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
