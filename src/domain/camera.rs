use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Restricciones que se piden a la fuente de vídeo. El adaptador puede ajustarlas
/// a los valores soportados más cercanos.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self { width: 640, height: 480, fps: 30 }
    }
}

/// Un frame capturado: RGB para inferencia y JPEG para la web.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub rgb: RgbImage,
    pub jpeg: Vec<u8>,
}
