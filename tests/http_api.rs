use axum::{routing::post, Json, Router};
use image::RgbImage;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use vision_labeler::adapters::{
    camera::still::StillCamera,
    detector::remote::RemoteDetectorLoader,
    http::{router, state::HttpState},
    storage::json_file::JsonFileStore,
};
use vision_labeler::application::{
    label_repo::LabelRepository,
    ports::KeyValueStorePort,
    services::LabelingService,
};
use vision_labeler::config::AppConfig;
use vision_labeler::domain::{camera::CameraConstraints, labels::STORAGE_KEY, model::DetectorParams};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

async fn state(client: &reqwest::Client, base: &str) -> Value {
    client.get(format!("{base}/api/state")).send().await.unwrap().json().await.unwrap()
}

#[tokio::test]
async fn dashboard_api_drives_the_full_labeling_flow() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("frames");
    std::fs::create_dir(&frames).unwrap();
    RgbImage::new(64, 48).save(frames.join("frame.png")).unwrap();

    let detect = Router::new().route(
        "/detect",
        post(|| async { Json(json!([{ "class": "cup", "score": 0.8, "bbox": [10.0, 10.0, 30.0, 30.0] }])) }),
    );
    let detector_url = format!("{}/detect", serve(detect).await);

    let store_path = dir.path().join("labels.json");
    let store = Arc::new(JsonFileStore::new(&store_path, 64 * 1024));
    let labeling = Arc::new(LabelingService::new(
        Arc::new(StillCamera::new(&frames)),
        Arc::new(RemoteDetectorLoader::new(detector_url, DetectorParams::default())),
        LabelRepository::new(store.clone(), STORAGE_KEY),
        CameraConstraints { width: 64, height: 48, fps: 30 },
        50,
    ));
    labeling.initialize().await.unwrap();

    let base = serve(router(HttpState { labeling: labeling.clone(), config: Arc::new(AppConfig::default()) })).await;
    let client = reqwest::Client::new();

    let snap = state(&client, &base).await;
    assert_eq!(snap["status"]["kind"], "ready");
    assert_eq!(snap["can_start"], true);

    let res = client.post(format!("{base}/api/detection/start")).send().await.unwrap();
    assert!(res.status().is_success());

    let mut count = 0;
    for _ in 0..300 {
        count = state(&client, &base).await["count"].as_u64().unwrap();
        if count == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(count, 1);

    let sel: Value = client
        .post(format!("{base}/api/select"))
        .json(&json!({ "x": 20.0, "y": 20.0 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sel["captured"], true);
    assert_eq!(sel["capture"]["detection"]["class"], "cup");

    let res = client.post(format!("{base}/api/labels")).json(&json!({ "label": "  " })).send().await.unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::BAD_REQUEST);

    let saved: Value = client
        .post(format!("{base}/api/labels"))
        .json(&json!({ "label": "My Mug" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(saved["status"], "saved");

    let labels: Value = client.get(format!("{base}/api/labels")).send().await.unwrap().json().await.unwrap();
    assert_eq!(labels["labels"], json!([{ "class": "cup", "label": "My Mug", "bbox": [10.0, 10.0, 30.0, 30.0], "score": 0.8 }]));

    let on_disk = JsonFileStore::new(&store_path, 64 * 1024).get(STORAGE_KEY).unwrap().unwrap();
    assert!(on_disk.contains("My Mug"));

    for bad in ["7", "-1", "abc"] {
        let res = client.post(format!("{base}/api/labels/{bad}/delete")).send().await.unwrap();
        assert!(res.status().is_success(), "{bad} must be a no-op, not an error");
        let req: Value = res.json().await.unwrap();
        assert_eq!(req["pending"], false);
    }
    assert_eq!(state(&client, &base).await["pending_delete"], Value::Null);

    let req: Value = client.post(format!("{base}/api/labels/0/delete")).send().await.unwrap().json().await.unwrap();
    assert_eq!(req["pending"], true);
    let done: Value = client.post(format!("{base}/api/delete/confirm")).send().await.unwrap().json().await.unwrap();
    assert_eq!(done["status"], "deleted");
    assert_eq!(store.get(STORAGE_KEY).unwrap().as_deref(), Some("[]"));

    client.post(format!("{base}/api/detection/stop")).send().await.unwrap();
    let snap = state(&client, &base).await;
    assert_eq!(snap["count"], 0);
    assert_eq!(snap["overlay"], json!([]));
    assert_eq!(snap["can_stop"], false);

    labeling.shutdown().await;
}
