//! Still capture from a live stream
//!
//! Grabs one frame at the stream's native resolution and encodes it as PNG.

use super::{Frame, LiveHandle};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub const PNG_MIME_TYPE: &str = "image/png";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("No frame available for capture")]
    NoFrameAvailable,
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
}

/// Encoded still image
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
}

impl ImageBuffer {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data: data.into(),
            width,
            height,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        PNG_MIME_TYPE
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotEncoder;

impl SnapshotEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Grab a single frame from `handle` and encode it losslessly.
    pub fn capture(&self, handle: &mut LiveHandle) -> Result<ImageBuffer, SnapshotError> {
        let frame = handle.grab_frame().ok_or(SnapshotError::NoFrameAvailable)?;
        let image = encode_png(&frame)?;

        debug!(
            handle = handle.id(),
            width = image.width(),
            height = image.height(),
            bytes = image.len(),
            "Snapshot encoded"
        );

        Ok(image)
    }
}

pub fn encode_png(frame: &Frame) -> Result<ImageBuffer, SnapshotError> {
    if frame.width == 0 || frame.height == 0 {
        return Err(SnapshotError::NoFrameAvailable);
    }

    if frame.pixels.len() != frame.expected_len() {
        return Err(SnapshotError::EncodingFailed(format!(
            "frame buffer has {} bytes, expected {} for {}x{}",
            frame.pixels.len(),
            frame.expected_len(),
            frame.width,
            frame.height
        )));
    }

    let mut data = Vec::new();
    PngEncoder::new(&mut data)
        .write_image(
            &frame.pixels,
            frame.width,
            frame.height,
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| SnapshotError::EncodingFailed(e.to_string()))?;

    Ok(ImageBuffer::new(data, frame.width, frame.height))
}
