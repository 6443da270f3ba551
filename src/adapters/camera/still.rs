use anyhow::Context;
use async_trait::async_trait;
use image::imageops::FilterType;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{frame_from_rgb, open_error};
use crate::application::ports::{CameraPort, FrameSource};
use crate::domain::{
    camera::{CameraConstraints, Frame},
    errors::{DomainError, DomainResult},
};

const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// "Cámara" que recorre en bucle las imágenes de un directorio. Sirve para
/// demos y para máquinas sin dispositivo de vídeo.
pub struct StillCamera {
    dir: PathBuf,
}

impl StillCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

fn list_images(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("leyendo {}", dir.display()))? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_image {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[async_trait]
impl CameraPort for StillCamera {
    async fn acquire(&self, constraints: &CameraConstraints) -> DomainResult<Box<dyn FrameSource>> {
        let dir = self.dir.clone();
        let what = dir.display().to_string();
        let paths = tokio::task::spawn_blocking(move || list_images(&dir))
            .await
            .map_err(|e| DomainError::OperationFailed(e.to_string()))?
            .map_err(|e| open_error(&what, &e))?;

        if paths.is_empty() {
            return Err(DomainError::DeviceUnavailable(format!("{what}: no contiene imágenes")));
        }
        info!("🖼️ Fuente de imágenes fijas: {} ficheros en {}", paths.len(), what);
        Ok(Box::new(StillFrameSource {
            paths,
            next: 0,
            width: constraints.width,
            height: constraints.height,
            released: false,
        }))
    }
}

pub struct StillFrameSource {
    paths: Vec<PathBuf>,
    next: usize,
    width: u32,
    height: u32,
    released: bool,
}

#[async_trait]
impl FrameSource for StillFrameSource {
    async fn next_frame(&mut self) -> DomainResult<Frame> {
        if self.released {
            return Err(DomainError::DeviceUnavailable("fuente liberada".into()));
        }
        let path = self.paths[self.next % self.paths.len()].clone();
        self.next = (self.next + 1) % self.paths.len();
        let (w, h) = (self.width, self.height);

        tokio::task::spawn_blocking(move || -> anyhow::Result<Frame> {
            let img = image::open(&path).with_context(|| format!("abriendo {}", path.display()))?;
            let rgb = if w > 0 && h > 0 && (img.width(), img.height()) != (w, h) {
                image::imageops::resize(&img.to_rgb8(), w, h, FilterType::Triangle)
            } else {
                img.to_rgb8()
            };
            frame_from_rgb(rgb)
        })
        .await
        .map_err(|e| DomainError::OperationFailed(e.to_string()))?
        .map_err(|e| DomainError::DeviceUnavailable(format!("{e:#}")))
    }

    fn release(&mut self) {
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn constraints() -> CameraConstraints {
        CameraConstraints { width: 32, height: 24, fps: 30 }
    }

    #[tokio::test]
    async fn cycles_through_images_resized_to_constraints() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(8, 8, Rgb([255, 0, 0])).save(dir.path().join("a.png")).unwrap();
        RgbImage::from_pixel(8, 8, Rgb([0, 0, 255])).save(dir.path().join("b.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = StillCamera::new(dir.path()).acquire(&constraints()).await.unwrap();
        let first = source.next_frame().await.unwrap();
        let second = source.next_frame().await.unwrap();
        let third = source.next_frame().await.unwrap();

        assert_eq!((first.width, first.height), (32, 24));
        assert!(first.rgb.get_pixel(5, 5)[0] > 200);
        assert!(second.rgb.get_pixel(5, 5)[2] > 200);
        assert!(second.rgb.get_pixel(5, 5)[0] < 50);
        assert!(third.rgb.get_pixel(5, 5)[0] > 200);
    }

    #[tokio::test]
    async fn empty_or_missing_dir_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = StillCamera::new(dir.path()).acquire(&constraints()).await.err().unwrap();
        assert!(matches!(err, DomainError::DeviceUnavailable(_)));

        let err = StillCamera::new(dir.path().join("nope")).acquire(&constraints()).await.err().unwrap();
        assert!(matches!(err, DomainError::DeviceUnavailable(_)));
    }

    #[tokio::test]
    async fn released_source_stops_producing() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(4, 4).save(dir.path().join("a.png")).unwrap();
        let mut source = StillCamera::new(dir.path()).acquire(&constraints()).await.unwrap();
        source.release();
        assert!(source.next_frame().await.is_err());
    }
}
