//! Check-in/check-out sequencing
//!
//! Pure transition logic: every event either returns the side effects the
//! owner must perform or is rejected with the state left untouched. The
//! machine never touches the device itself.

use super::{AttendanceDay, CaptureSlot, CaptureState, PhotoRef};
use crate::camera::{DeviceError, ImageBuffer};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenDevice(CaptureSlot),
    AttachPreview,
    CloseDevice,
    Submit {
        slot: CaptureSlot,
        image: ImageBuffer,
    },
}

/// An event that the current state does not accept
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("{} is already recorded for today", .0.label())]
    SlotFilled(CaptureSlot),
    #[error("Check-out requires a check-in first")]
    CheckInRequired,
    #[error("cannot {action} while {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
}

/// Failure reported by the submission collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SubmissionError {
    pub message: String,
}

impl SubmissionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub struct CaptureStateMachine {
    state: CaptureState,
    day: Option<Arc<AttendanceDay>>,
    last_error: Option<String>,
}

impl CaptureStateMachine {
    pub fn new(day: Option<Arc<AttendanceDay>>) -> Self {
        let state = resting_state(day.as_deref());
        debug!(state = %state, "Capture state initialized");

        Self {
            state,
            day,
            last_error: None,
        }
    }

    pub fn state(&self) -> &CaptureState {
        &self.state
    }

    pub fn day(&self) -> Option<&Arc<AttendanceDay>> {
        self.day.as_ref()
    }

    /// Error text from the last failed attempt, cleared when a new one starts
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn request_capture(&mut self, slot: CaptureSlot) -> Result<Vec<Effect>, Rejected> {
        match &self.state {
            CaptureState::Idle => {}
            CaptureState::DeviceError(active, _) if *active == slot => {}
            other => return Err(self.reject("request a capture", other)),
        }
        self.slot_available(slot)?;

        self.last_error = None;
        self.transition(CaptureState::DeviceStarting(slot));
        Ok(vec![Effect::OpenDevice(slot)])
    }

    pub fn device_opened(&mut self, slot: CaptureSlot) -> Result<Vec<Effect>, Rejected> {
        match &self.state {
            CaptureState::DeviceStarting(active) if *active == slot => {
                self.transition(CaptureState::DevicePreview(slot));
                Ok(vec![Effect::AttachPreview])
            }
            other => Err(self.reject("accept an opened camera", other)),
        }
    }

    pub fn device_failed(
        &mut self,
        slot: CaptureSlot,
        error: DeviceError,
    ) -> Result<Vec<Effect>, Rejected> {
        match &self.state {
            CaptureState::DeviceStarting(active) if *active == slot => {
                self.last_error = Some(error.to_string());
                self.transition(CaptureState::DeviceError(slot, error));
                Ok(Vec::new())
            }
            other => Err(self.reject("accept a camera failure", other)),
        }
    }

    pub fn snapshot(&mut self, image: ImageBuffer) -> Result<Vec<Effect>, Rejected> {
        match &self.state {
            CaptureState::DevicePreview(slot) => {
                let slot = *slot;
                self.transition(CaptureState::Submitting(slot, image.clone()));
                Ok(vec![Effect::CloseDevice, Effect::Submit { slot, image }])
            }
            other => Err(self.reject("take a snapshot", other)),
        }
    }

    /// Records the day returned by the backend and settles on the state that
    /// record implies. When the backend returns no photo for a confirmed
    /// slot, the submitted buffer stands in for it. A record that leaves the
    /// slot empty is kept but reported through [`last_error`](Self::last_error).
    pub fn submission_succeeded(
        &mut self,
        slot: CaptureSlot,
        mut day: AttendanceDay,
    ) -> Result<Vec<Effect>, Rejected> {
        match &self.state {
            CaptureState::Submitting(active, image) if *active == slot => {
                let confirmed = day.is_filled(slot);
                if confirmed {
                    let photo = match slot {
                        CaptureSlot::CheckIn => &mut day.check_in_photo,
                        CaptureSlot::CheckOut => &mut day.check_out_photo,
                    };
                    if photo.is_none() {
                        *photo = Some(PhotoRef::Inline(image.clone()));
                    }
                    self.last_error = None;
                } else {
                    warn!(slot = %slot, "Submission response did not record the slot");
                    self.last_error =
                        Some(format!("{} was not confirmed by the server", slot.label()));
                }

                let next = resting_state(Some(&day));
                self.day = Some(Arc::new(day));
                self.transition(next);
                Ok(Vec::new())
            }
            other => Err(self.reject("accept a submission result", other)),
        }
    }

    /// The captured buffer is discarded; the user has to capture again.
    pub fn submission_failed(
        &mut self,
        slot: CaptureSlot,
        error: &SubmissionError,
    ) -> Result<Vec<Effect>, Rejected> {
        match &self.state {
            CaptureState::Submitting(active, _) if *active == slot => {
                self.last_error = Some(error.message.clone());
                self.transition(CaptureState::Idle);
                Ok(Vec::new())
            }
            other => Err(self.reject("accept a submission failure", other)),
        }
    }

    /// Leave any capturing state for `Idle`. Always asks for the device to be
    /// closed, whatever the state was.
    pub fn cancel(&mut self) -> Vec<Effect> {
        if self.state.is_capturing() {
            self.transition(CaptureState::Idle);
        }
        vec![Effect::CloseDevice]
    }

    /// Swap in a freshly fetched day record. Resting states are re-derived
    /// from it; a flow in progress keeps its state.
    pub fn replace_day(&mut self, day: Option<Arc<AttendanceDay>>) {
        self.day = day;

        if matches!(self.state, CaptureState::Idle | CaptureState::Complete) {
            let next = resting_state(self.day.as_deref());
            if next != self.state {
                self.transition(next);
            }
        }
    }

    /// Whether the button for `slot` should be enabled
    pub fn can_request(&self, slot: CaptureSlot) -> bool {
        let state_allows = match &self.state {
            CaptureState::Idle => true,
            CaptureState::DeviceError(active, _) => *active == slot,
            _ => false,
        };
        state_allows && self.slot_available(slot).is_ok()
    }

    pub fn can_capture(&self) -> bool {
        matches!(self.state, CaptureState::DevicePreview(_))
    }

    fn slot_available(&self, slot: CaptureSlot) -> Result<(), Rejected> {
        let day = self.day.as_deref();
        let checked_in = day.is_some_and(AttendanceDay::is_checked_in);
        let checked_out = day.is_some_and(AttendanceDay::is_checked_out);

        match slot {
            CaptureSlot::CheckIn if checked_in => Err(Rejected::SlotFilled(slot)),
            CaptureSlot::CheckIn => Ok(()),
            CaptureSlot::CheckOut if !checked_in => Err(Rejected::CheckInRequired),
            CaptureSlot::CheckOut if checked_out => Err(Rejected::SlotFilled(slot)),
            CaptureSlot::CheckOut => Ok(()),
        }
    }

    fn reject(&self, action: &'static str, state: &CaptureState) -> Rejected {
        debug!(action, state = %state, "Capture event rejected");
        Rejected::InvalidState {
            action,
            state: state.name(),
        }
    }

    fn transition(&mut self, next: CaptureState) {
        debug!(from = %self.state, to = %next, "Capture state transition");
        self.state = next;
    }
}

fn resting_state(day: Option<&AttendanceDay>) -> CaptureState {
    match day {
        Some(day) if day.is_complete() => CaptureState::Complete,
        _ => CaptureState::Idle,
    }
}
