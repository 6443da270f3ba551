use serde::{Deserialize, Serialize};

use crate::domain::{capture::Capture, labels::LabeledObject};

/// Punto de clic en coordenadas del frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectRequest {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SelectResponse {
    pub captured: bool,
    pub capture: Option<Capture>,
}

impl From<Option<Capture>> for SelectResponse {
    fn from(capture: Option<Capture>) -> Self {
        Self { captured: capture.is_some(), capture }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveLabelRequest {
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LabelsResponse {
    pub labels: Vec<LabeledObject>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteRequestResponse {
    pub pending: bool,
    pub object: Option<LabeledObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}
