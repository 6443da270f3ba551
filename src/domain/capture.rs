use base64::{prelude::BASE64_STANDARD, Engine};
use image::{Rgb, RgbImage};
use serde::Serialize;

use super::camera::Frame;
use super::detection::{BBox, Detection};
use super::errors::{DomainError, DomainResult};

const PREVIEW_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const PREVIEW_THICKNESS: u32 = 4;

/// Detección congelada a la espera de que el usuario le ponga nombre.
#[derive(Debug, Clone, Serialize)]
pub struct Capture {
    pub detection: Detection,
    /// `data:image/jpeg;base64,...` con el recuadro quemado.
    pub preview: String,
}

impl Capture {
    pub fn freeze(frame: &Frame, detection: Detection) -> DomainResult<Self> {
        let preview = render_preview(frame, &detection.bbox)?;
        Ok(Self { detection, preview })
    }
}

pub fn render_preview(frame: &Frame, bbox: &BBox) -> DomainResult<String> {
    let mut img = frame.rgb.clone();
    draw_rect(&mut img, bbox, PREVIEW_COLOR, PREVIEW_THICKNESS);

    let mut jpeg = Vec::new();
    let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 85);
    enc.encode(img.as_raw(), img.width(), img.height(), image::ExtendedColorType::Rgb8)
        .map_err(|e| DomainError::OperationFailed(format!("No se pudo codificar la vista previa: {e}")))?;

    Ok(format!("data:image/jpeg;base64,{}", BASE64_STANDARD.encode(jpeg)))
}

/// Dibuja el contorno recortado a los límites de la imagen.
pub fn draw_rect(img: &mut RgbImage, bbox: &BBox, color: Rgb<u8>, thickness: u32) {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let clamp = |v: f32, max: u32| v.round().clamp(0.0, (max - 1) as f32) as u32;
    let x0 = clamp(bbox.x, w);
    let y0 = clamp(bbox.y, h);
    let x1 = clamp(bbox.x + bbox.width, w);
    let y1 = clamp(bbox.y + bbox.height, h);

    for t in 0..thickness {
        let top = (y0 + t).min(y1);
        let bottom = y1.saturating_sub(t).max(y0);
        for x in x0..=x1 {
            img.put_pixel(x, top, color);
            img.put_pixel(x, bottom, color);
        }
        let left = (x0 + t).min(x1);
        let right = x1.saturating_sub(t).max(x0);
        for y in y0..=y1 {
            img.put_pixel(left, y, color);
            img.put_pixel(right, y, color);
        }
    }
}
