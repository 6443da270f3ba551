use axum::{extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

use crate::adapters::http::state::HttpState;
use crate::application::dto::{
    DeleteRequestResponse, LabelsResponse, OkResponse, SaveLabelRequest, SelectRequest, SelectResponse,
};
use crate::domain::errors::DomainError;

/// Traducción de errores de dominio a respuestas HTTP.
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = match &self.0 {
            DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            DomainError::StorageFull(_) => StatusCode::INSUFFICIENT_STORAGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (code, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn get_config(State(st): State<HttpState>) -> impl IntoResponse {
    Json(st.config.as_ref().clone())
}

pub async fn get_state(State(st): State<HttpState>) -> impl IntoResponse {
    Json(st.labeling.snapshot().await)
}

pub async fn start_detection(State(st): State<HttpState>) -> Result<Json<OkResponse>, ApiError> {
    st.labeling.start_detection().await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn stop_detection(State(st): State<HttpState>) -> impl IntoResponse {
    st.labeling.stop_detection().await;
    Json(OkResponse { ok: true })
}

pub async fn select(State(st): State<HttpState>, Json(req): Json<SelectRequest>) -> Result<Json<SelectResponse>, ApiError> {
    let capture = st.labeling.select_at(req.x, req.y).await?;
    Ok(Json(capture.into()))
}

pub async fn cancel_capture(State(st): State<HttpState>) -> impl IntoResponse {
    st.labeling.cancel_capture().await;
    Json(OkResponse { ok: true })
}

pub async fn list_labels(State(st): State<HttpState>) -> impl IntoResponse {
    Json(LabelsResponse { labels: st.labeling.labels().await })
}

pub async fn save_label(State(st): State<HttpState>, Json(req): Json<SaveLabelRequest>) -> Result<Response, ApiError> {
    let outcome = st.labeling.save_label(&req.label).await?;
    Ok(Json(outcome).into_response())
}

/// Una posición que no es un índice válido (`-1`, `abc`) se trata como fuera de rango.
pub async fn request_delete(State(st): State<HttpState>, Path(index): Path<String>) -> impl IntoResponse {
    let object = match index.parse::<usize>() {
        Ok(i) => st.labeling.request_delete(i).await,
        Err(_) => None,
    };
    Json(DeleteRequestResponse { pending: object.is_some(), object })
}

pub async fn confirm_delete(State(st): State<HttpState>) -> impl IntoResponse {
    Json(st.labeling.confirm_delete().await)
}

pub async fn cancel_delete(State(st): State<HttpState>) -> impl IntoResponse {
    st.labeling.cancel_delete().await;
    Json(OkResponse { ok: true })
}
