use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    application::{
        label_repo::LabelRepository,
        ports::{CameraPort, DetectorPort, FrameSource, ModelLoaderPort},
    },
    domain::{
        camera::{CameraConstraints, Frame},
        capture::Capture,
        detection::{select_detection, Detection},
        errors::{DomainError, DomainResult},
        labels::{derive_index, remove_at, upsert, LabeledObject, SavedLabelIndex, Upsert},
        stream::{build_overlay, summarize_detections, Banner, FrameMeta, OverlayBox, Status, UiEvent, UiMessage},
    },
};

/// Tiempo que el aviso de error de almacenamiento permanece visible.
pub const BANNER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingDelete {
    pub index: usize,
    pub object: LabeledObject,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    Saved { upsert: Upsert },
    /// El almacén rechazó la escritura; el estado en memoria no cambió.
    NotPersisted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted { object: LabeledObject },
    /// Posición fuera de rango: no-op.
    Ignored,
    /// La posición ya no contiene el registro que se pidió confirmar.
    Stale,
    NothingPending,
    NotPersisted { reason: String },
}

/// Foto del estado para `GET /api/state`.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub status: Status,
    pub detecting: bool,
    pub can_start: bool,
    pub can_stop: bool,
    pub count: usize,
    pub overlay: Vec<OverlayBox>,
    pub labels: Vec<LabeledObject>,
    pub capture: Option<Capture>,
    pub pending_delete: Option<PendingDelete>,
    pub banner: Option<Banner>,
}

struct AppState {
    status: Status,
    detector: Option<Arc<dyn DetectorPort>>,
    detecting: bool,
    session: u64,
    current_detections: Vec<Detection>,
    current_frame: Option<Arc<Frame>>,
    overlay: Vec<OverlayBox>,
    labels: Vec<LabeledObject>,
    index: SavedLabelIndex,
    capture: Option<Capture>,
    pending_delete: Option<PendingDelete>,
    banner: Option<Banner>,
    banner_seq: u64,
}

impl AppState {
    fn new() -> Self {
        Self {
            status: Status::loading("Inicializando..."),
            detector: None,
            detecting: false,
            session: 0,
            current_detections: Vec::new(),
            current_frame: None,
            overlay: Vec::new(),
            labels: Vec::new(),
            index: SavedLabelIndex::new(),
            capture: None,
            pending_delete: None,
            banner: None,
            banner_seq: 0,
        }
    }

    fn is_active(&self, session: u64) -> bool {
        self.detecting && self.session == session
    }

    fn can_start(&self) -> bool {
        self.detector.is_some() && !self.detecting
    }

    fn status_event(&self) -> UiEvent {
        UiEvent::Status { status: self.status.clone(), can_start: self.can_start(), can_stop: self.detecting }
    }

    /// Baja la bandera y limpia el overlay en el mismo paso.
    fn halt(&mut self) {
        self.detecting = false;
        self.current_detections.clear();
        self.current_frame = None;
        self.overlay.clear();
    }

    fn commit_labels(&mut self, labels: Vec<LabeledObject>) {
        self.labels = labels;
        self.index = derive_index(&self.labels);
    }
}

/// Controlador único de la aplicación: bucle de detección, flujo de captura/etiquetado
/// y lista de etiquetas persistidas. Todas las mutaciones pasan por `state`.
pub struct LabelingService {
    camera: Arc<dyn CameraPort>,
    loader: Arc<dyn ModelLoaderPort>,
    repo: LabelRepository,
    constraints: CameraConstraints,
    frame_period: Duration,
    state: Mutex<AppState>,
    source: Mutex<Option<Box<dyn FrameSource>>>,
    tx: broadcast::Sender<UiMessage>,
}

impl LabelingService {
    pub fn new(
        camera: Arc<dyn CameraPort>,
        loader: Arc<dyn ModelLoaderPort>,
        repo: LabelRepository,
        constraints: CameraConstraints,
        loop_fps: u32,
    ) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            camera,
            loader,
            repo,
            constraints,
            frame_period: Duration::from_secs_f64(1.0 / loop_fps.max(1) as f64),
            state: Mutex::new(AppState::new()),
            source: Mutex::new(None),
            tx,
        }
    }

    fn publish(&self, event: UiEvent, jpeg: Option<Vec<u8>>) {
        if self.tx.receiver_count() > 0 {
            let _ = self.tx.send((event, jpeg));
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiMessage> {
        self.tx.subscribe()
    }

    async fn set_status(&self, status: Status) {
        let mut st = self.state.lock().await;
        st.status = status;
        self.publish(st.status_event(), None);
    }

    /// Cámara, modelo y etiquetas guardadas. Un fallo de cámara o de modelo es
    /// terminal para la sesión: queda reflejado en el estado y no se reintenta.
    pub async fn initialize(&self) -> DomainResult<()> {
        self.set_status(Status::loading("Cargando cámara y modelo...")).await;

        if let Err(e) = self.acquire_camera().await {
            error!("❌ Error abriendo cámara: {}", e);
            let msg = match e {
                DomainError::PermissionDenied(_) => "Permite el acceso a la cámara",
                _ => "Cámara no disponible",
            };
            self.set_status(Status::error(msg)).await;
            return Err(e);
        }

        match self.loader.load().await {
            Ok(detector) => {
                self.state.lock().await.detector = Some(detector);
                info!("✅ Modelo cargado.");
            }
            Err(e) => {
                error!("❌ Error cargando modelo: {}", e);
                self.set_status(Status::error("El modelo no se pudo cargar")).await;
                return Err(e);
            }
        }

        self.reload_labels().await;
        self.set_status(Status::ready("Listo - pulsa Start para detectar")).await;
        Ok(())
    }

    /// Suelta la fuente anterior antes de pedir una nueva.
    pub async fn acquire_camera(&self) -> DomainResult<()> {
        let mut source = self.source.lock().await;
        if let Some(mut old) = source.take() {
            old.release();
        }
        *source = Some(self.camera.acquire(&self.constraints).await?);
        info!(
            "📷 Cámara adquirida ({}x{} @ {} FPS)",
            self.constraints.width, self.constraints.height, self.constraints.fps
        );
        Ok(())
    }

    /// Punto de sincronización: el almacén es la fuente de verdad.
    pub async fn reload_labels(&self) {
        let labels = self.repo.load();
        let mut st = self.state.lock().await;
        st.commit_labels(labels);
        self.publish(UiEvent::Labels { labels: st.labels.clone() }, None);
    }

    pub async fn start_detection(self: &Arc<Self>) -> DomainResult<()> {
        let mut st = self.state.lock().await;
        if st.detector.is_none() {
            st.status = Status::error("Modelo no cargado");
            self.publish(st.status_event(), None);
            return Err(DomainError::InvalidInput("El modelo no está cargado".into()));
        }
        if st.detecting {
            return Ok(());
        }
        st.detecting = true;
        st.session += 1;
        st.status = Status::ready("Detectando objetos - haz clic en un objeto para etiquetarlo");
        self.publish(st.status_event(), None);

        let session = st.session;
        info!("▶️ Detección iniciada (sesión {})", session);
        tokio::spawn(Arc::clone(self).run_loop(session));
        Ok(())
    }

    /// Sin sesión activa no hace nada: un estado `Error` previo se conserva.
    pub async fn stop_detection(&self) {
        let mut st = self.state.lock().await;
        if !st.detecting {
            return;
        }
        st.halt();
        st.status = Status::ready("Listo");
        self.publish(UiEvent::Overlay { count: 0, overlay: Vec::new() }, None);
        self.publish(st.status_event(), None);
        info!("⏹️ Detección detenida");
    }

    async fn run_loop(self: Arc<Self>, session: u64) {
        let mut ticker = tokio::time::interval(self.frame_period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut fps_est: f32 = 0.0;
        let mut last_t = Instant::now();

        loop {
            ticker.tick().await;

            let detector = {
                let st = self.state.lock().await;
                match (&st.detector, st.is_active(session)) {
                    (Some(d), true) => Arc::clone(d),
                    _ => break,
                }
            };

            let frame = {
                let mut source = self.source.lock().await;
                match source.as_mut() {
                    Some(s) => s.next_frame().await,
                    None => Err(DomainError::DeviceUnavailable("sin fuente de vídeo".into())),
                }
            };
            let frame = match frame {
                Ok(f) => Arc::new(f),
                Err(e) => {
                    self.fail_session(session, e).await;
                    break;
                }
            };

            let t_infer = Instant::now();
            let detections = match detector.detect(&frame).await {
                Ok(d) => d,
                Err(e) => {
                    self.fail_session(session, e).await;
                    break;
                }
            };
            let infer_ms = t_infer.elapsed().as_secs_f32() * 1000.0;

            let dt = last_t.elapsed().as_secs_f32().max(0.001);
            last_t = Instant::now();
            fps_est = 0.9 * fps_est + 0.1 * (1.0 / dt);

            let mut st = self.state.lock().await;
            // La inferencia en vuelo de una sesión detenida se descarta sin pintar.
            if !st.is_active(session) {
                debug!("Resultado de la sesión {} descartado", session);
                break;
            }
            if !detections.is_empty() {
                debug!("Detecciones: {}", summarize_detections(&detections));
            }
            st.overlay = build_overlay(&detections, &st.index);
            st.current_detections = detections;
            st.current_frame = Some(Arc::clone(&frame));
            let meta = FrameMeta {
                width: frame.width,
                height: frame.height,
                infer_ms,
                fps_est,
                count: st.current_detections.len(),
                overlay: st.overlay.clone(),
            };
            // Se publica con el lock tomado: un stop posterior siempre llega detrás.
            self.publish(UiEvent::Frame { meta }, Some(frame.jpeg.clone()));
            drop(st);
        }
    }

    async fn fail_session(&self, session: u64, err: DomainError) {
        let mut st = self.state.lock().await;
        if !st.is_active(session) {
            return;
        }
        error!("❌ Error de detección, se detiene la sesión {}: {}", session, err);
        st.halt();
        st.status = Status::error("Error de detección");
        self.publish(UiEvent::Overlay { count: 0, overlay: Vec::new() }, None);
        self.publish(st.status_event(), None);
    }

    /// Inicia una captura con la primera detección que contiene el punto.
    pub async fn select_at(&self, x: f32, y: f32) -> DomainResult<Option<Capture>> {
        let mut st = self.state.lock().await;
        if !st.detecting || st.current_detections.is_empty() {
            return Ok(None);
        }
        let Some(hit) = select_detection(&st.current_detections, x, y).cloned() else {
            return Ok(None);
        };
        let Some(frame) = st.current_frame.clone() else {
            return Ok(None);
        };

        let capture = Capture::freeze(&frame, hit)?;
        if st.capture.is_some() {
            debug!("Captura anterior reemplazada");
        }
        info!("🎯 Capturado '{}' ({:.2})", capture.detection.class, capture.detection.score);
        st.capture = Some(capture.clone());
        self.publish(UiEvent::Capture { capture: st.capture.clone() }, None);
        Ok(Some(capture))
    }

    pub async fn cancel_capture(&self) {
        let mut st = self.state.lock().await;
        if st.capture.take().is_some() {
            self.publish(UiEvent::Capture { capture: None }, None);
        }
    }

    /// Guarda la etiqueta de la captura activa. Se muta un borrador leído del
    /// almacén y sólo se confirma en memoria si la escritura tiene éxito.
    pub async fn save_label(self: &Arc<Self>, text: &str) -> DomainResult<SaveOutcome> {
        let label = text.trim();
        if label.is_empty() {
            return Err(DomainError::InvalidInput("La etiqueta no puede estar vacía".into()));
        }

        let mut st = self.state.lock().await;
        let object = match &st.capture {
            Some(c) => LabeledObject::from_detection(&c.detection, label),
            None => return Err(DomainError::InvalidInput("No hay ninguna captura activa".into())),
        };

        let mut draft = self.repo.load();
        let result = upsert(&mut draft, object);
        if let Err(e) = self.repo.persist(&draft) {
            warn!("⚠️ No se pudo guardar la etiqueta '{}': {}", label, e);
            let reason = e.to_string();
            self.show_banner(&mut st, format!("No se pudo guardar la etiqueta: {reason}"));
            return Ok(SaveOutcome::NotPersisted { reason });
        }

        st.commit_labels(draft);
        st.capture = None;
        info!("💾 Etiqueta '{}' guardada ({:?})", label, result);
        self.publish(UiEvent::Labels { labels: st.labels.clone() }, None);
        self.publish(UiEvent::Capture { capture: None }, None);
        Ok(SaveOutcome::Saved { upsert: result })
    }

    /// Primer paso del borrado: devuelve el registro a confirmar.
    pub async fn request_delete(&self, index: usize) -> Option<LabeledObject> {
        let mut st = self.state.lock().await;
        let object = st.labels.get(index).cloned()?;
        st.pending_delete = Some(PendingDelete { index, object: object.clone() });
        Some(object)
    }

    pub async fn cancel_delete(&self) {
        self.state.lock().await.pending_delete = None;
    }

    pub async fn confirm_delete(self: &Arc<Self>) -> DeleteOutcome {
        let mut st = self.state.lock().await;
        let Some(pending) = st.pending_delete.take() else {
            return DeleteOutcome::NothingPending;
        };

        let mut draft = self.repo.load();
        match draft.get(pending.index) {
            None => return DeleteOutcome::Ignored,
            Some(o) if o.class != pending.object.class || o.label != pending.object.label => {
                debug!("Borrado obsoleto en la posición {}", pending.index);
                return DeleteOutcome::Stale;
            }
            Some(_) => {}
        }
        let Some(removed) = remove_at(&mut draft, pending.index) else {
            return DeleteOutcome::Ignored;
        };

        if let Err(e) = self.repo.persist(&draft) {
            warn!("⚠️ No se pudo borrar la etiqueta: {}", e);
            let reason = e.to_string();
            self.show_banner(&mut st, format!("No se pudo borrar la etiqueta: {reason}"));
            return DeleteOutcome::NotPersisted { reason };
        }

        st.commit_labels(draft);
        info!("🗑️ Etiqueta '{}' ({}) borrada", removed.label, removed.class);
        self.publish(UiEvent::Labels { labels: st.labels.clone() }, None);
        DeleteOutcome::Deleted { object: removed }
    }

    /// Muestra el aviso y programa su ocultación. Un aviso posterior reinicia el plazo.
    fn show_banner(self: &Arc<Self>, st: &mut AppState, message: String) {
        st.banner_seq += 1;
        st.banner = Some(Banner { message });
        self.publish(UiEvent::Banner { banner: st.banner.clone() }, None);

        let seq = st.banner_seq;
        let deadline = Instant::now() + BANNER_TIMEOUT;
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut st = this.state.lock().await;
            if st.banner_seq == seq {
                st.banner = None;
                this.publish(UiEvent::Banner { banner: None }, None);
            }
        });
    }

    pub async fn labels(&self) -> Vec<LabeledObject> {
        self.state.lock().await.labels.clone()
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let st = self.state.lock().await;
        StateSnapshot {
            status: st.status.clone(),
            detecting: st.detecting,
            can_start: st.can_start(),
            can_stop: st.detecting,
            count: st.current_detections.len(),
            overlay: st.overlay.clone(),
            labels: st.labels.clone(),
            capture: st.capture.clone(),
            pending_delete: st.pending_delete.clone(),
            banner: st.banner.clone(),
        }
    }

    /// Cierre ordenado: detiene la detección y libera la cámara.
    pub async fn shutdown(&self) {
        self.stop_detection().await;
        if let Some(mut source) = self.source.lock().await.take() {
            source.release();
            info!("📷 Cámara liberada");
        }
    }
}
