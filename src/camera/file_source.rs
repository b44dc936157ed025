//! Virtual camera backed by a still image on disk
//!
//! Every open decodes the file once and serves that frame until stopped.
//! Useful on machines without a webcam and for kiosk demos.

use super::{CameraBackend, DeviceError, Frame, StreamRequest, VideoStream};
use image::ImageError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct FileCameraBackend {
    path: PathBuf,
    name: String,
}

impl FileCameraBackend {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let name = format!("file:{}", path.display());
        Self { path, name }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraBackend for FileCameraBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, DeviceError> {
        if !request.video {
            return Err(DeviceError::Unknown("video track was not requested".to_string()));
        }

        let frame = load_frame(&self.path)?;
        info!(
            path = %self.path.display(),
            width = frame.width,
            height = frame.height,
            "Virtual camera opened"
        );

        Ok(Box::new(StillImageStream {
            frame,
            stopped: false,
        }))
    }
}

fn load_frame(path: &Path) -> Result<Frame, DeviceError> {
    let image = image::open(path).map_err(|e| match e {
        ImageError::IoError(io) => match io.kind() {
            ErrorKind::NotFound => DeviceError::NoDevice,
            ErrorKind::PermissionDenied => DeviceError::PermissionDenied,
            _ => DeviceError::Unknown(io.to_string()),
        },
        other => DeviceError::Unknown(other.to_string()),
    })?;

    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(Frame::new(width, height, rgba.into_raw()))
}

struct StillImageStream {
    frame: Frame,
    stopped: bool,
}

impl VideoStream for StillImageStream {
    fn resolution(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.stopped {
            return None;
        }
        Some(self.frame.clone())
    }

    fn stop(&mut self) {
        if !self.stopped {
            debug!("Virtual camera stopped");
        }
        self.stopped = true;
    }
}
