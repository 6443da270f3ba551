use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::capture::Capture;
use super::detection::{BBox, Detection};
use super::labels::{LabeledObject, SavedLabelIndex};

pub const SAVED_COLOR: &str = "#FF00FF";
pub const UNSAVED_COLOR: &str = "#00FFFF";

/// Recuadro listo para pintar en el canvas del dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayBox {
    pub bbox: BBox,
    pub text: String,
    pub color: String,
    pub saved_label: Option<String>,
}

pub fn display_text(detection: &Detection, saved_label: Option<&str>) -> String {
    let pct = detection.score * 100.0;
    match saved_label {
        Some(label) => format!("{} ({}) {:.1}%", label, detection.class, pct),
        None => format!("{} {:.1}%", detection.class, pct),
    }
}

pub fn build_overlay(detections: &[Detection], index: &SavedLabelIndex) -> Vec<OverlayBox> {
    detections
        .iter()
        .map(|d| {
            let saved = index.get(&d.class).map(String::as_str);
            OverlayBox {
                bbox: d.bbox,
                text: display_text(d, saved),
                color: if saved.is_some() { SAVED_COLOR } else { UNSAVED_COLOR }.to_string(),
                saved_label: saved.map(str::to_string),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Loading,
    Ready,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub message: String,
}

impl Status {
    pub fn loading(message: impl Into<String>) -> Self {
        Self { kind: StatusKind::Loading, message: message.into() }
    }
    pub fn ready(message: impl Into<String>) -> Self {
        Self { kind: StatusKind::Ready, message: message.into() }
    }
    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: StatusKind::Error, message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameMeta {
    pub width: u32,
    pub height: u32,
    pub infer_ms: f32,
    pub fps_est: f32,
    pub count: usize,
    pub overlay: Vec<OverlayBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub message: String,
}

/// Eventos empujados al dashboard por WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Frame { meta: FrameMeta },
    /// Overlay vacío tras detener la detección.
    Overlay { count: usize, overlay: Vec<OverlayBox> },
    Status { status: Status, can_start: bool, can_stop: bool },
    Labels { labels: Vec<LabeledObject> },
    Capture { capture: Option<Capture> },
    Banner { banner: Option<Banner> },
}

/// Evento más, opcionalmente, el JPEG del frame que va detrás como mensaje binario.
pub type UiMessage = (UiEvent, Option<Vec<u8>>);

/// Resumen tipo "2 cup, 1 book" para los logs.
pub fn summarize_detections(detections: &[Detection]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for det in detections {
        *counts.entry(det.class.as_str()).or_insert(0) += 1;
    }
    let mut parts: Vec<_> = counts.into_iter().collect();
    parts.sort();
    parts
        .iter()
        .map(|(class, count)| format!("{} {}", count, class))
        .collect::<Vec<_>>()
        .join(", ")
}
