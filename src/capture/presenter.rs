//! Binds the capture machine to the camera session and the attendance API.
//!
//! User actions are handled synchronously; device opens, submissions and
//! refreshes run as tasks that report back through an event channel. Every
//! flow-related event carries the epoch it was started in, and events from an
//! older epoch are dropped along with anything they carry.

use super::{
    AttendanceDay, CaptureSlot, CaptureState, CaptureStateMachine, Effect, PhotoRef, Rejected,
    SubmissionError,
};
use crate::api::{ApiError, AttendanceService};
use crate::camera::{
    CameraBackend, DeviceCameraSession, DeviceError, Frame, PendingOpen, PreviewSink,
    SnapshotEncoder, SnapshotError,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum PresenterError {
    #[error(transparent)]
    Rejected(#[from] Rejected),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("capture presenter has been torn down")]
    TornDown,
}

/// Completion of background work
#[derive(Debug)]
pub enum PresenterEvent {
    DeviceOpened {
        epoch: u64,
        slot: CaptureSlot,
        result: Result<PendingOpen, DeviceError>,
    },
    Submitted {
        epoch: u64,
        slot: CaptureSlot,
        result: Result<AttendanceDay, SubmissionError>,
    },
    Refreshed {
        generation: u64,
        result: Result<Option<AttendanceDay>, ApiError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient message shown after a submission settles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    fn success(title: String) -> Self {
        Self {
            kind: NoticeKind::Success,
            title,
            description: None,
        }
    }

    fn error(title: String, description: String) -> Self {
        Self {
            kind: NoticeKind::Error,
            title,
            description: Some(description),
        }
    }
}

/// What the preview area shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewRegion {
    Placeholder,
    Starting(CaptureSlot),
    Live(CaptureSlot),
    Error { slot: CaptureSlot, message: String },
    Submitting(CaptureSlot),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureView {
    pub state: &'static str,
    pub preview: PreviewRegion,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub check_in_photo: Option<PhotoRef>,
    pub check_out_photo: Option<PhotoRef>,
    pub check_in_enabled: bool,
    pub check_out_enabled: bool,
    pub capture_enabled: bool,
    pub cancel_enabled: bool,
    pub error: Option<String>,
    pub notice: Option<Notice>,
}

impl CaptureView {
    pub fn preview_visible(&self) -> bool {
        matches!(
            self.preview,
            PreviewRegion::Starting(_) | PreviewRegion::Live(_)
        )
    }
}

pub struct AttendanceCapturePresenter {
    machine: CaptureStateMachine,
    session: DeviceCameraSession,
    encoder: SnapshotEncoder,
    api: Arc<dyn AttendanceService>,
    events_tx: mpsc::UnboundedSender<PresenterEvent>,
    events_rx: mpsc::UnboundedReceiver<PresenterEvent>,
    tasks: Vec<JoinHandle<()>>,
    pending: usize,
    epoch: u64,
    day_generation: u64,
    preview: PreviewSink,
    notice: Option<Notice>,
    torn_down: bool,
}

impl AttendanceCapturePresenter {
    pub fn new(backend: Arc<dyn CameraBackend>, api: Arc<dyn AttendanceService>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (preview, _) = watch::channel(None);

        Self {
            machine: CaptureStateMachine::new(None),
            session: DeviceCameraSession::new(backend),
            encoder: SnapshotEncoder::new(),
            api,
            events_tx,
            events_rx,
            tasks: Vec::new(),
            pending: 0,
            epoch: 0,
            day_generation: 0,
            preview: Arc::new(preview),
            notice: None,
            torn_down: false,
        }
    }

    /// Start over from the given day record. Any flow in progress is dropped.
    pub fn initialize(&mut self, today: Option<AttendanceDay>) -> Result<(), PresenterError> {
        self.ensure_active()?;

        self.session.close();
        self.epoch += 1;
        self.day_generation += 1;
        self.notice = None;
        self.machine = CaptureStateMachine::new(today.map(Arc::new));
        info!(state = %self.machine.state(), "Capture presenter initialized");
        Ok(())
    }

    pub fn on_user_request_check_in(&mut self) -> Result<(), PresenterError> {
        self.request(CaptureSlot::CheckIn)
    }

    pub fn on_user_request_check_out(&mut self) -> Result<(), PresenterError> {
        self.request(CaptureSlot::CheckOut)
    }

    /// Take the picture and hand it to the backend for the active slot.
    pub fn on_user_snapshot(&mut self) -> Result<(), PresenterError> {
        self.ensure_active()?;

        if !self.machine.can_capture() {
            return Err(Rejected::InvalidState {
                action: "take a snapshot",
                state: self.machine.state().name(),
            }
            .into());
        }

        let captured = match self.session.handle_mut() {
            Some(handle) => self.encoder.capture(handle),
            None => Err(SnapshotError::NoFrameAvailable),
        };
        let image = captured.inspect_err(|e| error!(error = %e, "Snapshot failed"))?;

        let effects = self.machine.snapshot(image)?;
        self.apply(effects);
        Ok(())
    }

    /// Abandon the current flow. The device is closed whatever the state.
    pub fn cancel(&mut self) {
        let was_submitting = matches!(self.machine.state(), CaptureState::Submitting(..));

        self.epoch += 1;
        let effects = self.machine.cancel();
        self.apply(effects);

        // The backend may still have recorded the photo
        if was_submitting {
            self.refresh();
        }
    }

    /// Release everything. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }

        self.epoch += 1;
        let effects = self.machine.cancel();
        self.apply(effects);
        self.torn_down = true;

        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.events_rx.close();
        while let Ok(event) = self.events_rx.try_recv() {
            drop(event);
        }
        self.pending = 0;

        info!("Capture presenter torn down");
    }

    /// Re-fetch today's record from the backend.
    pub fn refresh(&mut self) {
        if self.torn_down {
            return;
        }

        self.day_generation += 1;
        let generation = self.day_generation;
        let api = Arc::clone(&self.api);

        self.spawn(async move {
            let result = api.fetch_today().await;
            PresenterEvent::Refreshed { generation, result }
        });
    }

    /// Push a fresh frame into the preview while one is shown.
    pub fn refresh_preview(&mut self) -> bool {
        self.machine.can_capture() && self.session.pump_preview()
    }

    pub fn preview(&self) -> watch::Receiver<Option<Frame>> {
        self.preview.subscribe()
    }

    /// Wait for the next background completion. `None` once torn down.
    pub async fn next_event(&mut self) -> Option<PresenterEvent> {
        if self.torn_down {
            return None;
        }
        self.events_rx.recv().await
    }

    pub fn handle_event(&mut self, event: PresenterEvent) {
        self.pending = self.pending.saturating_sub(1);
        if self.torn_down {
            return;
        }

        match event {
            PresenterEvent::DeviceOpened {
                epoch,
                slot,
                result,
            } => {
                if epoch != self.epoch {
                    debug!(slot = %slot, "Discarding stale camera result");
                    return;
                }
                self.on_device_result(slot, result);
            }
            PresenterEvent::Submitted {
                epoch,
                slot,
                result,
            } => {
                if epoch != self.epoch {
                    debug!(slot = %slot, "Discarding stale submission result");
                    return;
                }
                self.on_submission_result(slot, result);
            }
            PresenterEvent::Refreshed { generation, result } => {
                if generation != self.day_generation {
                    debug!("Discarding stale attendance refresh");
                    return;
                }
                match result {
                    Ok(day) => {
                        debug!(found = day.is_some(), "Attendance refreshed");
                        self.machine.replace_day(day.map(Arc::new));
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to refresh attendance");
                        self.notice = Some(Notice::error(
                            "Failed to load attendance".to_string(),
                            e.to_string(),
                        ));
                    }
                }
            }
        }
    }

    /// Process events until no background work is outstanding.
    pub async fn settle(&mut self) {
        while self.pending > 0 {
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
    }

    pub fn state(&self) -> &CaptureState {
        self.machine.state()
    }

    pub fn day(&self) -> Option<&AttendanceDay> {
        self.machine.day().map(Arc::as_ref)
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    pub fn view(&self) -> CaptureView {
        let state = self.machine.state();
        let day = self.day();

        let preview = match state {
            CaptureState::DeviceStarting(slot) => PreviewRegion::Starting(*slot),
            CaptureState::DevicePreview(slot) => PreviewRegion::Live(*slot),
            CaptureState::DeviceError(slot, err) => PreviewRegion::Error {
                slot: *slot,
                message: err.to_string(),
            },
            CaptureState::Submitting(slot, _) => PreviewRegion::Submitting(*slot),
            CaptureState::Idle | CaptureState::Complete => PreviewRegion::Placeholder,
        };

        CaptureView {
            state: state.name(),
            preview,
            check_in_at: day.and_then(|d| d.check_in_at),
            check_out_at: day.and_then(|d| d.check_out_at),
            check_in_photo: day.and_then(|d| d.check_in_photo.clone()),
            check_out_photo: day.and_then(|d| d.check_out_photo.clone()),
            check_in_enabled: self.machine.can_request(CaptureSlot::CheckIn),
            check_out_enabled: self.machine.can_request(CaptureSlot::CheckOut),
            capture_enabled: self.machine.can_capture(),
            cancel_enabled: state.is_capturing(),
            error: self.machine.last_error().map(str::to_string),
            notice: self.notice.clone(),
        }
    }

    fn request(&mut self, slot: CaptureSlot) -> Result<(), PresenterError> {
        self.ensure_active()?;

        let effects = self.machine.request_capture(slot)?;
        self.epoch += 1;
        self.notice = None;
        info!(slot = %slot, "Capture requested");
        self.apply(effects);
        Ok(())
    }

    fn on_device_result(&mut self, slot: CaptureSlot, result: Result<PendingOpen, DeviceError>) {
        let opened = result.and_then(|pending| self.session.adopt(pending).map(|_| ()));

        match opened {
            Ok(()) => match self.machine.device_opened(slot) {
                Ok(effects) => self.apply(effects),
                Err(_) => self.session.close(),
            },
            Err(e) => {
                warn!(slot = %slot, error = %e, "Camera unavailable");
                if self.machine.device_failed(slot, e).is_ok() {
                    self.session.close();
                }
            }
        }
    }

    fn on_submission_result(
        &mut self,
        slot: CaptureSlot,
        result: Result<AttendanceDay, SubmissionError>,
    ) {
        match result {
            Ok(day) => {
                if self.machine.submission_succeeded(slot, day).is_ok() {
                    // Older refreshes must not overwrite the returned record
                    self.day_generation += 1;
                    self.notice = Some(match self.machine.last_error() {
                        None => {
                            info!(slot = %slot, "Attendance recorded");
                            Notice::success(format!("{} successful!", slot.label()))
                        }
                        Some(problem) => Notice::error(
                            format!("{} failed!, please try again.", slot.label()),
                            problem.to_string(),
                        ),
                    });
                }
            }
            Err(e) => {
                if self.machine.submission_failed(slot, &e).is_ok() {
                    warn!(slot = %slot, error = %e, "Attendance submission failed");
                    self.notice = Some(Notice::error(
                        format!("{} failed!, please try again.", slot.label()),
                        e.message,
                    ));
                }
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::OpenDevice(slot) => {
                    let epoch = self.epoch;
                    let open = self.session.acquire();
                    self.spawn(async move {
                        let result = open.await;
                        PresenterEvent::DeviceOpened {
                            epoch,
                            slot,
                            result,
                        }
                    });
                }
                Effect::AttachPreview => {
                    if let Err(e) = self.session.attach_to(Arc::clone(&self.preview)) {
                        warn!(error = %e, "Preview not attached");
                    }
                }
                Effect::CloseDevice => self.session.close(),
                Effect::Submit { slot, image } => {
                    let epoch = self.epoch;
                    let api = Arc::clone(&self.api);
                    let attendance_id = self
                        .machine
                        .day()
                        .map(|d| d.id.clone())
                        .unwrap_or_default();

                    self.spawn(async move {
                        let result = match slot {
                            CaptureSlot::CheckIn => api.submit_check_in(image).await,
                            CaptureSlot::CheckOut => {
                                api.submit_check_out(&attendance_id, image).await
                            }
                        };
                        PresenterEvent::Submitted {
                            epoch,
                            slot,
                            result: result.map_err(|e| SubmissionError::new(e.to_string())),
                        }
                    });
                }
            }
        }

        debug_assert!(
            !self.session.is_open() || self.machine.state().camera_live(),
            "camera open in state {}",
            self.machine.state()
        );
    }

    fn spawn<F>(&mut self, work: F)
    where
        F: Future<Output = PresenterEvent> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(tokio::spawn(async move {
            // Fails only after teardown; the event and its handle are dropped
            let _ = tx.send(work.await);
        }));
        self.pending += 1;
    }

    fn ensure_active(&self) -> Result<(), PresenterError> {
        if self.torn_down {
            Err(PresenterError::TornDown)
        } else {
            Ok(())
        }
    }
}

impl Drop for AttendanceCapturePresenter {
    fn drop(&mut self) {
        self.teardown();
    }
}
