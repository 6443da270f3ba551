#[cfg(feature = "onnx")]
pub mod onnx;
pub mod remote;

use crate::domain::{detection::Detection, model::DetectorParams};

/// Umbral de confianza, supresión de no máximos por clase y tope de resultados.
/// La supresión se decide por confianza, pero los supervivientes salen en el
/// orden en que los devolvió el modelo: la selección por clic depende de él.
pub fn postprocess(detections: Vec<Detection>, params: &DetectorParams) -> Vec<Detection> {
    let mut by_score: Vec<usize> = (0..detections.len())
        .filter(|&i| detections[i].score >= params.conf_threshold)
        .collect();
    by_score.sort_by(|&a, &b| detections[b].score.total_cmp(&detections[a].score));

    let mut keep = vec![false; detections.len()];
    let mut kept: Vec<usize> = Vec::with_capacity(by_score.len());
    for i in by_score {
        if kept.len() >= params.max_detections {
            break;
        }
        let det = &detections[i];
        let suppressed = kept.iter().any(|&k| {
            let k = &detections[k];
            k.class == det.class && k.bbox.iou(&det.bbox) > params.iou_threshold
        });
        if !suppressed {
            keep[i] = true;
            kept.push(i);
        }
    }

    detections
        .into_iter()
        .zip(keep)
        .filter_map(|(d, k)| k.then_some(d))
        .collect()
}
