use anyhow::{anyhow, Result};
use async_trait::async_trait;
use image::{ImageFormat, RgbImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{oneshot, watch};
use tracing::{info, warn};
use v4l::format::FourCC;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::Device;

use super::{frame_from_rgb, open_error};
use crate::application::ports::{CameraPort, FrameSource};
use crate::domain::{
    camera::{CameraConstraints, Frame},
    errors::{DomainError, DomainResult},
};

/// Cámara física por V4L2.
pub struct V4l2Camera {
    device: String,
    fourcc: String,
}

impl V4l2Camera {
    pub fn new(device: impl Into<String>, fourcc: impl Into<String>) -> Self {
        Self { device: device.into(), fourcc: fourcc.into() }
    }
}

#[async_trait]
impl CameraPort for V4l2Camera {
    async fn acquire(&self, constraints: &CameraConstraints) -> DomainResult<Box<dyn FrameSource>> {
        let device = self.device.clone();
        let fourcc = self.fourcc.clone();
        let constraints = constraints.clone();

        let stop = Arc::new(AtomicBool::new(false));
        let (frame_tx, frame_rx) = watch::channel::<Option<Arc<Frame>>>(None);
        let (ready_tx, ready_rx) = oneshot::channel::<DomainResult<()>>();

        // El stream mmap no es Send: dispositivo y stream viven en su propio hilo
        // y se cierran cuando éste termina.
        let worker_stop = stop.clone();
        let handle = std::thread::spawn(move || {
            let dev = match Device::with_path(&device) {
                Ok(d) => d,
                Err(e) => {
                    let _ = ready_tx.send(Err(open_error(&device, &e.into())));
                    return;
                }
            };
            let mut capture = match V4l2Capture::open(&dev, &fourcc, &constraints) {
                Ok(c) => {
                    let _ = ready_tx.send(Ok(()));
                    c
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(open_error(&device, &e)));
                    return;
                }
            };

            while !worker_stop.load(Ordering::Relaxed) {
                match capture.next_frame() {
                    Ok(frame) => {
                        if frame_tx.send(Some(Arc::new(frame))).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Error capturando frame: {}", e);
                        std::thread::sleep(std::time::Duration::from_millis(10));
                    }
                }
            }
            info!("Hilo de captura de {} terminado", device);
        });

        ready_rx
            .await
            .map_err(|_| DomainError::DeviceUnavailable(format!("{}: el hilo de captura terminó", self.device)))??;

        Ok(Box::new(V4l2FrameSource { rx: frame_rx, stop, handle: Some(handle) }))
    }
}

pub struct V4l2FrameSource {
    rx: watch::Receiver<Option<Arc<Frame>>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

#[async_trait]
impl FrameSource for V4l2FrameSource {
    /// Espera al siguiente frame publicado por el hilo de captura.
    async fn next_frame(&mut self) -> DomainResult<Frame> {
        self.rx
            .changed()
            .await
            .map_err(|_| DomainError::DeviceUnavailable("la captura se detuvo".into()))?;
        let frame = self.rx.borrow_and_update().clone();
        frame
            .map(|f| f.as_ref().clone())
            .ok_or_else(|| DomainError::DeviceUnavailable("sin frame".into()))
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for V4l2FrameSource {
    fn drop(&mut self) {
        self.release();
    }
}

struct V4l2Capture<'a> {
    stream: Stream<'a>,
    fourcc: FourCC,
    width: u32,
    height: u32,
}

impl<'a> V4l2Capture<'a> {
    /// Fija formato y FPS e inicia el flujo MMAP sobre un dispositivo ya abierto.
    fn open(dev: &'a Device, fourcc: &str, constraints: &CameraConstraints) -> Result<Self> {
        let mut fmt = dev.format()?;
        let b = fourcc.as_bytes();
        if b.len() != 4 {
            return Err(anyhow!("FourCC debe tener 4 caracteres"));
        }
        fmt.fourcc = FourCC::new(&[b[0], b[1], b[2], b[3]]);
        fmt.width = constraints.width;
        fmt.height = constraints.height;

        // El driver puede ajustar a los valores soportados más cercanos
        let actual_fmt = dev.set_format(&fmt)?;

        let mut params = dev.params()?;
        params.interval.numerator = 1;
        params.interval.denominator = constraints.fps;
        let _ = dev.set_params(&params);

        let stream = Stream::with_buffers(dev, v4l::buffer::Type::VideoCapture, 4)?;

        info!(
            "Cámara abierta: {}x{} [{}] a {} FPS",
            actual_fmt.width, actual_fmt.height, actual_fmt.fourcc, constraints.fps
        );

        Ok(Self { stream, fourcc: actual_fmt.fourcc, width: actual_fmt.width, height: actual_fmt.height })
    }

    fn next_frame(&mut self) -> Result<Frame> {
        let (data, _) = self.stream.next()?;
        let fcc_str = self.fourcc.str().map_err(|_| anyhow!("FourCC inválido"))?;

        match fcc_str {
            "MJPG" => {
                let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg)?;
                Ok(Frame { width: self.width, height: self.height, rgb: img.to_rgb8(), jpeg: data.to_vec() })
            }
            "YUYV" => frame_from_rgb(yuyv_to_rgb(data, self.width, self.height)),
            _ => Err(anyhow!("Formato de cámara {} no soportado", fcc_str)),
        }
    }
}

/// YUYV (4:2:2) a RGB con BT.601. Cada bloque de 4 bytes son 2 píxeles: [Y0, U, Y1, V].
fn yuyv_to_rgb(yuyv: &[u8], w: u32, h: u32) -> RgbImage {
    let mut out = RgbImage::new(w, h);
    let to_rgb = |y: f32, u: f32, v: f32| {
        image::Rgb([
            (y + 1.402 * v).clamp(0.0, 255.0) as u8,
            (y - 0.344136 * u - 0.714136 * v).clamp(0.0, 255.0) as u8,
            (y + 1.772 * u).clamp(0.0, 255.0) as u8,
        ])
    };

    for (i, chunk) in yuyv.chunks_exact(4).enumerate() {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;

        let pixel_idx = i as u32 * 2;
        let x = pixel_idx % w;
        let y = pixel_idx / w;
        if y < h {
            out.put_pixel(x, y, to_rgb(chunk[0] as f32, u, v));
            if x + 1 < w {
                out.put_pixel(x + 1, y, to_rgb(chunk[2] as f32, u, v));
            }
        }
    }
    out
}
