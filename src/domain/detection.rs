use serde::{Deserialize, Serialize};

/// Rectángulo alineado a los ejes en píxeles del frame.
/// En JSON viaja como `[x, y, width, height]`, igual que lo produce el detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Bordes incluidos.
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);
        let inter = if x2 > x1 && y2 > y1 { (x2 - x1) * (y2 - y1) } else { 0.0 };
        let union = self.area() + other.area() - inter;
        if union > 0.0 { inter / union } else { 0.0 }
    }
}

impl From<[f32; 4]> for BBox {
    fn from([x, y, width, height]: [f32; 4]) -> Self {
        Self { x, y, width, height }
    }
}

impl From<BBox> for [f32; 4] {
    fn from(b: BBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub score: f32,
    pub bbox: BBox,
}

impl Detection {
    pub fn new(class: impl Into<String>, score: f32, bbox: BBox) -> Self {
        Self { class: class.into(), score, bbox }
    }
}

/// Primera detección (en orden de salida del modelo) cuyo rectángulo contiene el punto.
/// No se resuelven solapes por confianza ni por orden z.
pub fn select_detection(detections: &[Detection], x: f32, y: f32) -> Option<&Detection> {
    detections.iter().find(|d| d.bbox.contains(x, y))
}
