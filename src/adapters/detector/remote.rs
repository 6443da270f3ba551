use async_trait::async_trait;
use base64::{prelude::BASE64_STANDARD, Engine};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::postprocess;
use crate::application::ports::{DetectorPort, ModelLoaderPort};
use crate::domain::{
    camera::Frame,
    detection::Detection,
    errors::{DomainError, DomainResult},
    model::DetectorParams,
};

/// Detector servido por HTTP: se le envía el JPEG en base64 y devuelve
/// `[{class, score, bbox: [x, y, w, h]}]` (o el mismo array bajo `detections`).
pub struct RemoteDetectorLoader {
    url: String,
    params: DetectorParams,
    timeout: Duration,
}

impl RemoteDetectorLoader {
    pub fn new(url: impl Into<String>, params: DetectorParams) -> Self {
        Self { url: url.into(), params, timeout: Duration::from_secs(10) }
    }
}

#[async_trait]
impl ModelLoaderPort for RemoteDetectorLoader {
    async fn load(&self) -> DomainResult<Arc<dyn DetectorPort>> {
        let url = reqwest::Url::parse(self.url.trim())
            .map_err(|e| DomainError::LoadError(format!("URL de detector inválida '{}': {e}", self.url)))?;
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| DomainError::LoadError(e.to_string()))?;
        info!("🌐 Detector remoto en {}", url);
        Ok(Arc::new(RemoteDetector { client, url, params: self.params.clone() }))
    }
}

pub struct RemoteDetector {
    client: reqwest::Client,
    url: reqwest::Url,
    params: DetectorParams,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RemoteResponse {
    Bare(Vec<Detection>),
    Wrapped { detections: Vec<Detection> },
}

#[async_trait]
impl DetectorPort for RemoteDetector {
    async fn detect(&self, frame: &Frame) -> DomainResult<Vec<Detection>> {
        let body = json!({
            "image": BASE64_STANDARD.encode(&frame.jpeg),
            "width": frame.width,
            "height": frame.height,
        });

        let res = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::InferenceError(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            return Err(DomainError::InferenceError(format!("el detector respondió {status}")));
        }
        let detections = match res
            .json::<RemoteResponse>()
            .await
            .map_err(|e| DomainError::InferenceError(format!("respuesta ilegible: {e}")))?
        {
            RemoteResponse::Bare(d) | RemoteResponse::Wrapped { detections: d } => d,
        };
        Ok(postprocess(detections, &self.params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use image::RgbImage;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/detect")
    }

    fn frame() -> Frame {
        crate::adapters::camera::frame_from_rgb(RgbImage::new(8, 8)).unwrap()
    }

    #[tokio::test]
    async fn parses_detections_from_endpoint() {
        let app = Router::new().route(
            "/detect",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert!(body["image"].as_str().is_some_and(|s| !s.is_empty()));
                Json(json!({ "detections": [
                    { "class": "cup", "score": 0.8, "bbox": [1.0, 2.0, 3.0, 4.0] },
                    { "class": "book", "score": 0.05, "bbox": [1.0, 2.0, 3.0, 4.0] }
                ]}))
            }),
        );
        let url = serve(app).await;

        let detector = RemoteDetectorLoader::new(url, DetectorParams::default()).load().await.unwrap();
        let dets = detector.detect(&frame()).await.unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class, "cup");
    }

    #[tokio::test]
    async fn endpoint_order_reaches_the_caller() {
        let app = Router::new().route(
            "/detect",
            post(|| async {
                Json(json!([
                    { "class": "cup", "score": 0.42, "bbox": [10.0, 10.0, 30.0, 30.0] },
                    { "class": "bottle", "score": 0.9, "bbox": [15.0, 5.0, 30.0, 30.0] }
                ]))
            }),
        );
        let url = serve(app).await;

        let detector = RemoteDetectorLoader::new(url, DetectorParams::default()).load().await.unwrap();
        let dets = detector.detect(&frame()).await.unwrap();
        let classes: Vec<_> = dets.iter().map(|d| d.class.as_str()).collect();
        assert_eq!(classes, vec!["cup", "bottle"]);
        let hit = crate::domain::detection::select_detection(&dets, 20.0, 20.0).unwrap();
        assert_eq!(hit.class, "cup");
    }

    #[tokio::test]
    async fn server_errors_are_inference_errors() {
        let app = Router::new().route("/detect", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let url = serve(app).await;

        let detector = RemoteDetectorLoader::new(url, DetectorParams::default()).load().await.unwrap();
        let err = detector.detect(&frame()).await.unwrap_err();
        assert!(matches!(err, DomainError::InferenceError(_)));
    }

    #[tokio::test]
    async fn invalid_url_fails_to_load() {
        let err = RemoteDetectorLoader::new("not a url", DetectorParams::default()).load().await.err().unwrap();
        assert!(matches!(err, DomainError::LoadError(_)));
    }
}
