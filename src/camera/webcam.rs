//! Physical webcam through nokhwa
//!
//! `nokhwa::Camera` is `!Send`, so each open starts a worker thread that owns
//! the camera for the life of the stream. The worker decodes frames to RGBA
//! and publishes the latest one on a `watch` channel; stopping the stream
//! signals the worker and joins it, which closes the device.

use super::{CameraBackend, DeviceError, Frame, StreamRequest, VideoStream};
use nokhwa::Camera;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const RETRY_DELAY: Duration = Duration::from_millis(50);

pub struct WebcamBackend {
    index: u32,
    name: String,
}

impl WebcamBackend {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            name: format!("webcam:{}", index),
        }
    }
}

impl CameraBackend for WebcamBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, DeviceError> {
        if !request.video {
            return Err(DeviceError::Unknown("video track was not requested".to_string()));
        }

        ensure_device_present(self.index)?;

        let index = self.index;
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (frames_tx, frames_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = thread::Builder::new()
            .name(format!("webcam-{}", index))
            .spawn(move || capture_loop(index, ready_tx, frames_tx, shutdown_rx))
            .map_err(|e| DeviceError::Unknown(format!("failed to start camera thread: {}", e)))?;

        let resolution = match ready_rx.recv() {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(DeviceError::Unknown("camera thread exited".to_string()));
            }
        };

        info!(
            device = index,
            width = resolution.0,
            height = resolution.1,
            "Webcam opened"
        );

        Ok(Box::new(WebcamStream {
            resolution,
            frames: frames_rx,
            shutdown: shutdown_tx,
            worker: Some(worker),
        }))
    }
}

/// Report `NoDevice` up front when the platform lists no camera at all.
fn ensure_device_present(index: u32) -> Result<(), DeviceError> {
    let backend = nokhwa::native_api_backend().unwrap_or(ApiBackend::Auto);

    match nokhwa::query(backend) {
        Ok(devices) if devices.is_empty() => Err(DeviceError::NoDevice),
        Ok(devices) => {
            debug!(device = index, available = devices.len(), "Cameras listed");
            Ok(())
        }
        Err(e) => Err(classify(&e.to_string())),
    }
}

fn capture_loop(
    index: u32,
    ready: mpsc::SyncSender<Result<(u32, u32), DeviceError>>,
    frames: watch::Sender<Option<Frame>>,
    shutdown: watch::Receiver<bool>,
) {
    // Native resolution; nothing is scaled before encoding
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution);

    let mut camera = match Camera::new(CameraIndex::Index(index), requested) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(classify(&e.to_string())));
            return;
        }
    };

    if let Err(e) = camera.open_stream() {
        let _ = ready.send(Err(classify(&e.to_string())));
        return;
    }

    let format = camera.camera_format();
    let resolution = (format.resolution().width_x, format.resolution().height_y);
    if ready.send(Ok(resolution)).is_err() {
        let _ = camera.stop_stream();
        return;
    }

    while !*shutdown.borrow() {
        match camera.frame() {
            Ok(buffer) => match buffer.decode_image::<RgbFormat>() {
                Ok(decoded) => {
                    let (width, height) = (decoded.width(), decoded.height());
                    match rgb_to_rgba(width, height, &decoded.into_raw()) {
                        Some(frame) => {
                            frames.send_replace(Some(frame));
                        }
                        None => warn!(width, height, "Webcam frame has unexpected size"),
                    }
                }
                Err(e) => warn!(error = %e, "Failed to decode webcam frame"),
            },
            Err(e) => {
                warn!(error = %e, "Failed to capture webcam frame");
                thread::sleep(RETRY_DELAY);
            }
        }
    }

    if let Err(e) = camera.stop_stream() {
        warn!(error = %e, "Error stopping webcam stream");
    }
    debug!(device = index, "Webcam worker stopped");
}

struct WebcamStream {
    resolution: (u32, u32),
    frames: watch::Receiver<Option<Frame>>,
    shutdown: watch::Sender<bool>,
    worker: Option<JoinHandle<()>>,
}

impl VideoStream for WebcamStream {
    fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.worker.is_none() {
            return None;
        }
        self.frames.borrow().clone()
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.shutdown.send_replace(true);
        if worker.join().is_err() {
            warn!("Webcam worker panicked");
        }
    }
}

/// Map a platform error message onto the errors the capture flow shows.
///
/// nokhwa reports every backend failure as text, so the message is all there
/// is to go on.
fn classify(message: &str) -> DeviceError {
    let lower = message.to_lowercase();

    if ["permission", "denied", "not authorized", "unauthorized"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        DeviceError::PermissionDenied
    } else if ["not found", "no such", "no device", "no camera", "out of range"]
        .iter()
        .any(|needle| lower.contains(needle))
    {
        DeviceError::NoDevice
    } else {
        DeviceError::Unknown(message.to_string())
    }
}

/// Widen packed RGB8 pixels to RGBA8. `None` if the buffer does not match the
/// dimensions.
fn rgb_to_rgba(width: u32, height: u32, rgb: &[u8]) -> Option<Frame> {
    if rgb.len() != width as usize * height as usize * 3 {
        return None;
    }

    let pixels = rgb
        .chunks_exact(3)
        .flat_map(|px| [px[0], px[1], px[2], u8::MAX])
        .collect();
    Some(Frame::new(width, height, pixels))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_messages_map_to_permission_denied() {
        assert_eq!(
            classify("Could not open device: Permission denied (os error 13)"),
            DeviceError::PermissionDenied
        );
        assert_eq!(
            classify("AVFoundation: camera access not authorized"),
            DeviceError::PermissionDenied
        );
    }

    #[test]
    fn missing_device_messages_map_to_no_device() {
        assert_eq!(
            classify("/dev/video3: No such file or directory"),
            DeviceError::NoDevice
        );
        assert_eq!(classify("Camera index 2 not found"), DeviceError::NoDevice);
    }

    #[test]
    fn other_messages_are_kept() {
        assert_eq!(
            classify("Device or resource busy"),
            DeviceError::Unknown("Device or resource busy".to_string())
        );
    }

    #[test]
    fn rgb_frames_gain_opaque_alpha_at_native_size() {
        let rgb = [10, 20, 30, 40, 50, 60];

        let frame = rgb_to_rgba(2, 1, &rgb).unwrap();

        assert_eq!((frame.width, frame.height), (2, 1));
        assert_eq!(&frame.pixels[..], &[10, 20, 30, 255, 40, 50, 60, 255]);
        assert_eq!(frame.pixels.len(), frame.expected_len());
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(rgb_to_rgba(2, 2, &[0; 6]).is_none());
    }

    #[test]
    fn audio_only_request_is_refused_before_touching_hardware() {
        let backend = WebcamBackend::new(0);
        let request = StreamRequest {
            video: false,
            audio: true,
        };

        assert!(matches!(backend.open(&request), Err(DeviceError::Unknown(_))));
        assert_eq!(backend.name(), "webcam:0");
    }
}
