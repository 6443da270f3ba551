use std::sync::Arc;

use crate::application::services::LabelingService;
use crate::config::AppConfig;

/// Estado compartido para los manejadores HTTP de Axum.
#[derive(Clone)]
pub struct HttpState {
    /// Controlador de detección, captura y etiquetas.
    pub labeling: Arc<LabelingService>,
    /// Configuración efectiva, expuesta en `/api/config`.
    pub config: Arc<AppConfig>,
}
