//! Camera device access
//!
//! ```text
//! DeviceCameraSession ──open()──▶ CameraBackend ──▶ VideoStream
//!        │                                              │
//!        └──────────── owns ──▶ LiveHandle ◀── wraps ───┘
//! ```
//!
//! Backends are blocking; the session runs `open` on the blocking pool.
//! A `LiveHandle` stops its stream when dropped, so a handle that is thrown
//! away on any path still releases the device. A session hands out one device
//! permit, held by its handle until the stream stops.

pub mod file_source;
pub mod session;
pub mod snapshot;
pub mod webcam;

pub use file_source::FileCameraBackend;
pub use session::{DeviceCameraSession, PendingOpen, PreviewSink};
pub use snapshot::{ImageBuffer, SnapshotEncoder, SnapshotError};
pub use webcam::WebcamBackend;

use crate::config::CameraSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;
use tracing::info;

/// Why a device could not be opened
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Unable to access camera. Please ensure you have given permission.")]
    PermissionDenied,
    #[error("No camera device was found.")]
    NoDevice,
    #[error("Camera request was cancelled.")]
    Cancelled,
    #[error("Camera error: {0}")]
    Unknown(String),
}

/// What the caller asks the platform for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub video: bool,
    pub audio: bool,
}

impl StreamRequest {
    pub fn video_only() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }
}

/// One decoded RGBA8 frame at the stream's native resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Expected byte length of an RGBA8 buffer with these dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A source of camera devices.
pub trait CameraBackend: Send + Sync {
    /// Human-readable backend name, used in logs
    fn name(&self) -> &str;

    /// Acquire a device stream. May block while the platform prompts for
    /// permission or initializes hardware.
    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, DeviceError>;
}

/// An acquired device stream.
pub trait VideoStream: Send {
    /// Native (width, height) of the stream
    fn resolution(&self) -> (u32, u32);

    /// Latest frame, or `None` when no frame has arrived yet
    fn next_frame(&mut self) -> Option<Frame>;

    /// Stop every track and release the device
    fn stop(&mut self);
}

/// Build the backend named by the configuration.
pub fn create_backend(source: &CameraSource) -> Arc<dyn CameraBackend> {
    match source {
        CameraSource::Webcam { device } => Arc::new(WebcamBackend::new(*device)),
        CameraSource::File(path) => Arc::new(FileCameraBackend::new(path)),
    }
}

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// An open, revocable reference to a capture device.
pub struct LiveHandle {
    id: u64,
    stream: Box<dyn VideoStream>,
    permit: Option<OwnedSemaphorePermit>,
    stopped: bool,
}

impl LiveHandle {
    pub fn new(stream: Box<dyn VideoStream>) -> Self {
        let id = NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed);
        let (width, height) = stream.resolution();
        info!(handle = id, width, height, "Camera acquired");

        Self {
            id,
            stream,
            permit: None,
            stopped: false,
        }
    }

    /// Keep `permit` until the stream stops.
    pub(crate) fn holding(mut self, permit: OwnedSemaphorePermit) -> Self {
        self.permit = Some(permit);
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.stream.resolution()
    }

    pub fn is_live(&self) -> bool {
        !self.stopped
    }

    pub fn grab_frame(&mut self) -> Option<Frame> {
        if self.stopped {
            return None;
        }
        self.stream.next_frame()
    }

    /// Stop the stream. Later calls do nothing.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stream.stop();
        self.permit = None;
        self.stopped = true;
        info!(handle = self.id, "Camera released");
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for LiveHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveHandle")
            .field("id", &self.id)
            .field("resolution", &self.resolution())
            .field("stopped", &self.stopped)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;

    #[test]
    fn video_only_request_has_no_audio() {
        let request = StreamRequest::video_only();
        assert!(request.video);
        assert!(!request.audio);
    }

    #[test]
    fn backend_follows_configured_source() {
        let webcam = create_backend(&CameraSource::Webcam { device: 1 });
        assert_eq!(webcam.name(), "webcam:1");

        let file = create_backend(&CameraSource::File("still.png".into()));
        assert_eq!(file.name(), "file:still.png");
    }

    #[test]
    fn dropping_handle_releases_device() {
        let backend = ScriptedBackend::new();
        let stream = backend.open(&StreamRequest::video_only()).unwrap();
        let handle = LiveHandle::new(stream);
        assert_eq!(backend.live_streams(), 1);

        drop(handle);
        assert_eq!(backend.live_streams(), 0);
        assert_eq!(backend.stop_calls(), 1);
    }

    #[test]
    fn stop_is_idempotent() {
        let backend = ScriptedBackend::new();
        let mut handle = LiveHandle::new(backend.open(&StreamRequest::video_only()).unwrap());

        handle.stop();
        handle.stop();
        drop(handle);

        assert_eq!(backend.stop_calls(), 1);
    }

    #[test]
    fn stopped_handle_yields_no_frames() {
        let backend = ScriptedBackend::new();
        let mut handle = LiveHandle::new(backend.open(&StreamRequest::video_only()).unwrap());
        assert!(handle.grab_frame().is_some());

        handle.stop();
        assert!(handle.grab_frame().is_none());
    }

    #[tokio::test]
    async fn stopping_handle_returns_its_permit() {
        let backend = ScriptedBackend::new();
        let permits = Arc::new(tokio::sync::Semaphore::new(1));
        let permit = Arc::clone(&permits).acquire_owned().await.unwrap();
        let mut handle =
            LiveHandle::new(backend.open(&StreamRequest::video_only()).unwrap()).holding(permit);
        assert_eq!(permits.available_permits(), 0);

        handle.stop();
        assert_eq!(permits.available_permits(), 1);
    }
}
