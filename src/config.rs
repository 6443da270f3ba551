use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::{
    camera::still::StillCamera,
    detector::remote::RemoteDetectorLoader,
    storage::{json_file::JsonFileStore, DEFAULT_CAPACITY_BYTES},
};
use crate::application::ports::{CameraPort, KeyValueStorePort, ModelLoaderPort};
use crate::domain::{camera::CameraConstraints, labels::STORAGE_KEY, model::DetectorParams};

/// Variable de entorno con la ruta del fichero de configuración.
pub const CONFIG_ENV: &str = "LABELER_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "labeler.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub bind: String,
    pub static_dir: PathBuf,
    /// Ritmo máximo del bucle de detección.
    pub loop_fps: u32,
    pub store: StoreConfig,
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8090".into(),
            static_dir: "static".into(),
            loop_fps: 30,
            store: StoreConfig::default(),
            camera: CameraConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub capacity_bytes: usize,
    pub key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data/labels.json".into(),
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
            key: STORAGE_KEY.into(),
        }
    }
}

impl StoreConfig {
    pub fn build(&self) -> Arc<dyn KeyValueStorePort> {
        Arc::new(JsonFileStore::new(&self.path, self.capacity_bytes))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CameraBackend {
    V4l2 { device: String, fourcc: String },
    Still { dir: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub source: CameraBackend,
    #[serde(flatten)]
    pub constraints: CameraConstraints,
}

impl Default for CameraBackend {
    /// V4L2 sólo si el binario lo trae; si no, las imágenes de `samples/`.
    fn default() -> Self {
        if cfg!(feature = "v4l2") {
            CameraBackend::V4l2 { device: "/dev/video0".into(), fourcc: "MJPG".into() }
        } else {
            CameraBackend::Still { dir: "samples".into() }
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { source: CameraBackend::default(), constraints: CameraConstraints::default() }
    }
}

impl CameraConfig {
    pub fn build(&self) -> Result<Arc<dyn CameraPort>> {
        match &self.source {
            CameraBackend::Still { dir } => Ok(Arc::new(StillCamera::new(dir))),
            #[cfg(feature = "v4l2")]
            CameraBackend::V4l2 { device, fourcc } => {
                Ok(Arc::new(crate::adapters::camera::v4l2::V4l2Camera::new(device, fourcc)))
            }
            #[cfg(not(feature = "v4l2"))]
            CameraBackend::V4l2 { device, .. } => {
                bail!("cámara V4L2 ({device}) pedida, pero el binario se compiló sin la feature `v4l2`")
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum DetectorBackend {
    Onnx { model_path: PathBuf },
    Remote { url: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub model: DetectorBackend,
    #[serde(flatten)]
    pub params: DetectorParams,
}

impl Default for DetectorBackend {
    fn default() -> Self {
        if cfg!(feature = "onnx") {
            DetectorBackend::Onnx { model_path: "models/yolo11n.onnx".into() }
        } else {
            DetectorBackend::Remote { url: "http://127.0.0.1:9100/detect".into() }
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { model: DetectorBackend::default(), params: DetectorParams::default() }
    }
}

impl DetectorConfig {
    pub fn build(&self) -> Result<Arc<dyn ModelLoaderPort>> {
        match &self.model {
            DetectorBackend::Remote { url } => Ok(Arc::new(RemoteDetectorLoader::new(url, self.params.clone()))),
            #[cfg(feature = "onnx")]
            DetectorBackend::Onnx { model_path } => Ok(Arc::new(
                crate::adapters::detector::onnx::OnnxModelLoader::new(model_path, self.params.clone()),
            )),
            #[cfg(not(feature = "onnx"))]
            DetectorBackend::Onnx { model_path } => {
                bail!("modelo ONNX ({}) pedido, pero el binario se compiló sin la feature `onnx`", model_path.display())
            }
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("leyendo {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parseando {}", path.display()))
    }

    /// `$LABELER_CONFIG` si está definida; si no, `labeler.json` cuando existe;
    /// en otro caso, valores por defecto.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE)),
            None => Ok(Self::default()),
        }
    }
}
