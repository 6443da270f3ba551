use std::sync::Arc;
use tower_http::services::ServeDir;
use vision_labeler::{
    adapters::http::{router, state::HttpState},
    application::{label_repo::LabelRepository, services::LabelingService},
    config::AppConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Logs (RUST_LOG=info por defecto)
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let config = Arc::new(AppConfig::load()?);
    tracing::info!("🔧 Inicializando adaptadores de infraestructura...");

    // 2. Adaptadores: cámara, modelo y almacén de etiquetas
    let camera = config.camera.build()?;
    let loader = config.detector.build()?;
    let repo = LabelRepository::new(config.store.build(), config.store.key.clone());

    // 3. Controlador único de la aplicación
    let labeling = Arc::new(LabelingService::new(
        camera,
        loader,
        repo,
        config.camera.constraints.clone(),
        config.loop_fps,
    ));

    // Un fallo de cámara o modelo queda en el estado que ve el dashboard;
    // el servidor sigue arriba para mostrarlo.
    if let Err(e) = labeling.initialize().await {
        tracing::error!("❌ Inicialización fallida: {}", e);
    }

    let state = HttpState { labeling: labeling.clone(), config: config.clone() };
    let app = router(state).fallback_service(ServeDir::new(&config.static_dir));

    tracing::info!("🚀 Servidor iniciado en http://{}", config.bind);
    tracing::info!("📂 Archivos estáticos servidos desde '{}'", config.static_dir.display());

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("🛑 Apagando...");
        })
        .await?;

    labeling.shutdown().await;
    Ok(())
}
