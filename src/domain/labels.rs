use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::detection::{BBox, Detection};

/// Clave única bajo la que vive la colección completa en el almacén.
pub const STORAGE_KEY: &str = "visionAI-labeledObjects";

/// Etiqueta asignada por el usuario a una clase detectada.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledObject {
    pub class: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl LabeledObject {
    pub fn from_detection(detection: &Detection, label: impl Into<String>) -> Self {
        Self {
            class: detection.class.clone(),
            label: label.into(),
            bbox: Some(detection.bbox),
            score: Some(detection.score),
        }
    }

    fn same_key(&self, other: &LabeledObject) -> bool {
        self.class == other.class && self.label == other.label
    }
}

/// Índice derivado `clase -> etiqueta`. Nunca se persiste.
pub type SavedLabelIndex = HashMap<String, String>;

/// Reconstruye el índice desde la colección: para una clase repetida gana el
/// registro que aparece más tarde.
pub fn derive_index(collection: &[LabeledObject]) -> SavedLabelIndex {
    collection
        .iter()
        .map(|o| (o.class.clone(), o.label.clone()))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "index", rename_all = "snake_case")]
pub enum Upsert {
    Replaced(usize),
    Appended(usize),
}

/// Reemplaza en su posición el registro con el mismo `(class, label)` o lo añade al final.
pub fn upsert(collection: &mut Vec<LabeledObject>, object: LabeledObject) -> Upsert {
    match collection.iter().position(|o| o.same_key(&object)) {
        Some(i) => {
            collection[i] = object;
            Upsert::Replaced(i)
        }
        None => {
            collection.push(object);
            Upsert::Appended(collection.len() - 1)
        }
    }
}

/// Fuera de rango no hace nada.
pub fn remove_at(collection: &mut Vec<LabeledObject>, index: usize) -> Option<LabeledObject> {
    (index < collection.len()).then(|| collection.remove(index))
}

/// Errores de parseo se devuelven para que el llamador decida; el repositorio
/// los degrada a colección vacía.
pub fn parse_collection(raw: &str) -> serde_json::Result<Vec<LabeledObject>> {
    serde_json::from_str(raw)
}
