pub mod still;
#[cfg(feature = "v4l2")]
pub mod v4l2;

use image::RgbImage;
use std::io::ErrorKind;

use crate::domain::{camera::Frame, errors::DomainError};

/// Empaqueta un RGB ya decodificado junto a su JPEG para la web.
pub fn frame_from_rgb(rgb: RgbImage) -> anyhow::Result<Frame> {
    let mut jpeg = Vec::new();
    let mut enc = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 80);
    enc.encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ExtendedColorType::Rgb8)?;
    Ok(Frame { width: rgb.width(), height: rgb.height(), rgb, jpeg })
}

/// Traduce un fallo de apertura al error de dominio de la cámara.
pub(crate) fn open_error(what: &str, err: &anyhow::Error) -> DomainError {
    let denied = err
        .chain()
        .filter_map(|e| e.downcast_ref::<std::io::Error>())
        .any(|e| e.kind() == ErrorKind::PermissionDenied);
    if denied {
        DomainError::PermissionDenied(format!("{what}: {err:#}"))
    } else {
        DomainError::DeviceUnavailable(format!("{what}: {err:#}"))
    }
}
