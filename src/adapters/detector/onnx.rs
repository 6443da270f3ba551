use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{imageops::FilterType, RgbImage};
use ndarray::{s, Array4, ArrayViewD, Axis, IxDyn};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::Value;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::info;

use super::postprocess;
use crate::application::ports::{DetectorPort, ModelLoaderPort};
use crate::domain::{
    camera::Frame,
    detection::{BBox, Detection},
    errors::{DomainError, DomainResult},
    model::DetectorParams,
};

/// Nombres COCO en el orden de salida de YOLO.
const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch", "potted plant",
    "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote", "keyboard", "cell phone",
    "microwave", "oven", "toaster", "sink", "refrigerator", "book", "clock", "vase", "scissors",
    "teddy bear", "hair drier", "toothbrush",
];

pub struct OnnxModelLoader {
    model_path: PathBuf,
    params: DetectorParams,
}

impl OnnxModelLoader {
    pub fn new(model_path: impl Into<PathBuf>, params: DetectorParams) -> Self {
        Self { model_path: model_path.into(), params }
    }
}

#[async_trait]
impl ModelLoaderPort for OnnxModelLoader {
    async fn load(&self) -> DomainResult<Arc<dyn DetectorPort>> {
        let path = self.model_path.clone();
        if !path.exists() {
            return Err(DomainError::LoadError(format!("modelo no encontrado: {}", path.display())));
        }
        let engine = tokio::task::spawn_blocking(move || OnnxYoloEngine::load(&path))
            .await
            .map_err(|e| DomainError::LoadError(e.to_string()))?
            .map_err(|e| DomainError::LoadError(format!("{e:#}")))?;

        info!("🧠 Modelo ONNX cargado desde {}", self.model_path.display());
        Ok(Arc::new(OnnxDetector { engine: Arc::new(Mutex::new(engine)), params: self.params.clone() }))
    }
}

pub struct OnnxDetector {
    engine: Arc<Mutex<OnnxYoloEngine>>,
    params: DetectorParams,
}

#[async_trait]
impl DetectorPort for OnnxDetector {
    async fn detect(&self, frame: &Frame) -> DomainResult<Vec<Detection>> {
        let engine = self.engine.clone();
        let params = self.params.clone();
        let rgb = frame.rgb.clone();

        let raw = tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().map_err(|_| anyhow!("sesión ONNX envenenada"))?;
            engine.infer(&rgb, &params)
        })
        .await
        .map_err(|e| DomainError::InferenceError(e.to_string()))?
        .map_err(|e| DomainError::InferenceError(format!("{e:#}")))?;

        Ok(postprocess(raw, &self.params))
    }
}

struct OnnxYoloEngine {
    session: Session,
}

impl OnnxYoloEngine {
    fn load(path: &std::path::Path) -> Result<Self> {
        let mut builder = Session::builder()?.with_intra_threads(4)?;

        // CUDA es opcional: si está disponible se registra, si no seguimos en CPU.
        let cuda = CUDAExecutionProvider::default().build();
        if let Ok(builder_with_cuda) = builder.clone().with_execution_providers([cuda]) {
            builder = builder_with_cuda;
        }

        let model_bytes = fs::read(path)?;
        let session = builder.commit_from_memory(&model_bytes)?;
        Ok(Self { session })
    }

    /// Candidatos por encima del umbral, sin NMS (lo aplica `postprocess`).
    fn infer(&mut self, rgb: &RgbImage, params: &DetectorParams) -> Result<Vec<Detection>> {
        let imgsz = params.input_size as usize;
        let resized = image::imageops::resize(rgb, imgsz as u32, imgsz as u32, FilterType::Nearest);

        let mut input = Array4::<f32>::zeros((1, 3, imgsz, imgsz));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }

        let input_shape = vec![1, 3, imgsz as i64, imgsz as i64];
        let input_tensor = Value::from_array((input_shape, input.into_raw_vec()))?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;
        let (shape_out, data_out) = outputs[0].try_extract_tensor::<f32>()?;

        let dims: Vec<usize> = shape_out.iter().map(|&x| x as usize).collect();
        let array_view = ArrayViewD::from_shape(IxDyn(&dims), data_out)?;
        let view = array_view.index_axis(Axis(0), 0);

        let num_candidates = view.shape()[1];
        let sx = rgb.width() as f32 / imgsz as f32;
        let sy = rgb.height() as f32 / imgsz as f32;

        let mut detections = Vec::new();
        for i in 0..num_candidates {
            let scores = view.slice(s![4.., i]);
            let Some((class_id, &max_score)) = scores
                .indexed_iter()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
            else {
                continue;
            };

            if max_score > params.conf_threshold {
                let (cx, cy, w, h) = (view[[0, i]], view[[1, i]], view[[2, i]], view[[3, i]]);
                detections.push(Detection {
                    class: COCO_CLASSES.get(class_id).unwrap_or(&"object").to_string(),
                    score: max_score,
                    bbox: BBox::new((cx - w / 2.0) * sx, (cy - h / 2.0) * sy, w * sx, h * sy),
                });
            }
        }
        Ok(detections)
    }
}
