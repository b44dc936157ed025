use crate::camera::{DeviceError, ImageBuffer};
use std::fmt;

/// Which half of the day a capture fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureSlot {
    CheckIn,
    CheckOut,
}

impl CaptureSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureSlot::CheckIn => "check-in",
            CaptureSlot::CheckOut => "check-out",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CaptureSlot::CheckIn => "Check-in",
            CaptureSlot::CheckOut => "Check-out",
        }
    }

    /// File name used when uploading the photo
    pub fn upload_file_name(&self) -> &'static str {
        match self {
            CaptureSlot::CheckIn => "checkin.png",
            CaptureSlot::CheckOut => "checkout.png",
        }
    }
}

impl fmt::Display for CaptureSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    DeviceStarting(CaptureSlot),
    DevicePreview(CaptureSlot),
    DeviceError(CaptureSlot, DeviceError),
    Submitting(CaptureSlot, ImageBuffer),
    Complete,
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::DeviceStarting(_) => "device-starting",
            CaptureState::DevicePreview(_) => "device-preview",
            CaptureState::DeviceError(..) => "device-error",
            CaptureState::Submitting(..) => "submitting",
            CaptureState::Complete => "complete",
        }
    }

    pub fn slot(&self) -> Option<CaptureSlot> {
        match self {
            CaptureState::DeviceStarting(slot)
            | CaptureState::DevicePreview(slot)
            | CaptureState::DeviceError(slot, _)
            | CaptureState::Submitting(slot, _) => Some(*slot),
            CaptureState::Idle | CaptureState::Complete => None,
        }
    }

    /// The camera may only be live in these states.
    pub fn camera_live(&self) -> bool {
        matches!(
            self,
            CaptureState::DeviceStarting(_) | CaptureState::DevicePreview(_)
        )
    }

    /// Any state a flow is in progress in; `cancel` leaves these for `Idle`.
    pub fn is_capturing(&self) -> bool {
        self.slot().is_some()
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.slot() {
            Some(slot) => write!(f, "{}({})", self.name(), slot),
            None => f.write_str(self.name()),
        }
    }
}
