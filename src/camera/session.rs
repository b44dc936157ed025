use super::{CameraBackend, DeviceError, Frame, LiveHandle, StreamRequest};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::{Semaphore, watch};
use tracing::{debug, warn};

/// Render surface for live frames
pub type PreviewSink = Arc<watch::Sender<Option<Frame>>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("camera session is not open")]
pub struct NotOpen;

#[derive(Debug, Default)]
struct Landing {
    revoked: bool,
    handle: Option<LiveHandle>,
}

/// Claim on a device open started by [`DeviceCameraSession::acquire`].
///
/// The opened handle lands inside the claim rather than travelling with it,
/// so the session can release it on `close` before the claim is redeemed.
#[derive(Debug, Clone, Default)]
pub struct PendingOpen(Arc<Mutex<Landing>>);

impl PendingOpen {
    fn lock(&self) -> MutexGuard<'_, Landing> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_revoked(&self) -> bool {
        self.lock().revoked
    }

    /// Store the opened handle, or give it back if the claim was revoked.
    fn land(&self, handle: LiveHandle) -> Result<(), LiveHandle> {
        let mut landing = self.lock();
        if landing.revoked {
            return Err(handle);
        }
        landing.handle = Some(handle);
        Ok(())
    }

    fn revoke(&self) -> Option<LiveHandle> {
        let mut landing = self.lock();
        landing.revoked = true;
        landing.handle.take()
    }

    fn is(&self, other: &PendingOpen) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Owns at most one live device handle.
pub struct DeviceCameraSession {
    backend: Arc<dyn CameraBackend>,
    device: Arc<Semaphore>,
    pending: Option<PendingOpen>,
    handle: Option<LiveHandle>,
    sink: Option<PreviewSink>,
}

impl DeviceCameraSession {
    pub fn new(backend: Arc<dyn CameraBackend>) -> Self {
        Self {
            backend,
            device: Arc::new(Semaphore::new(1)),
            pending: None,
            handle: None,
            sink: None,
        }
    }

    /// Open the device, or return the handle that is already open.
    pub async fn open(&mut self) -> Result<&mut LiveHandle, DeviceError> {
        if self.handle.is_none() {
            let pending = self.acquire().await?;
            self.adopt(pending)?;
        } else {
            debug!("Camera already open");
        }
        self.handle.as_mut().ok_or(DeviceError::Cancelled)
    }

    /// Start acquiring the device without tying the future to the session.
    ///
    /// Any earlier open that has not been adopted is revoked. Opens are
    /// serialized on the session's device permit, so a new open waits until
    /// the previous handle has been stopped. A handle that finishes opening
    /// after its claim was revoked is stopped on the blocking thread.
    pub fn acquire(
        &mut self,
    ) -> impl Future<Output = Result<PendingOpen, DeviceError>> + Send + use<> {
        let backend = Arc::clone(&self.backend);
        let device = Arc::clone(&self.device);
        let pending = PendingOpen::default();

        if let Some(previous) = self.pending.replace(pending.clone()) {
            if let Some(mut handle) = previous.revoke() {
                debug!(handle = handle.id(), "Superseded camera request");
                handle.stop();
            }
        }

        async move {
            let name = backend.name().to_string();
            let permit = device
                .acquire_owned()
                .await
                .map_err(|e| DeviceError::Unknown(format!("camera permit closed: {}", e)))?;
            debug!(backend = %name, "Requesting camera access");

            tokio::task::spawn_blocking(move || {
                if pending.is_revoked() {
                    return Err(DeviceError::Cancelled);
                }

                let stream = backend.open(&StreamRequest::video_only())?;
                let handle = LiveHandle::new(stream).holding(permit);
                match pending.land(handle) {
                    Ok(()) => Ok(pending),
                    Err(mut late) => {
                        debug!(handle = late.id(), "Camera request revoked while opening");
                        late.stop();
                        Err(DeviceError::Cancelled)
                    }
                }
            })
            .await
            .map_err(|e| DeviceError::Unknown(format!("camera task failed: {}", e)))?
        }
    }

    /// Take ownership of the handle produced by [`acquire`](Self::acquire).
    ///
    /// Only the most recent claim can be redeemed; an older one has already
    /// been revoked and yields [`DeviceError::Cancelled`].
    pub fn adopt(&mut self, pending: PendingOpen) -> Result<&mut LiveHandle, DeviceError> {
        if !self.pending.as_ref().is_some_and(|current| current.is(&pending)) {
            if let Some(mut handle) = pending.revoke() {
                handle.stop();
            }
            return Err(DeviceError::Cancelled);
        }

        self.pending = None;
        let handle = pending.revoke().ok_or(DeviceError::Cancelled)?;

        if let Some(existing) = self.handle.take() {
            warn!(
                kept = existing.id(),
                released = handle.id(),
                "Session already holds a camera, releasing the new one"
            );
            drop(handle);
            return Ok(self.handle.insert(existing));
        }

        Ok(self.handle.insert(handle))
    }

    /// Stop every track and release the handle. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(pending) = self.pending.take() {
            if let Some(mut handle) = pending.revoke() {
                handle.stop();
            }
        }

        if let Some(sink) = self.sink.take() {
            sink.send_replace(None);
        }

        if let Some(mut handle) = self.handle.take() {
            handle.stop();
        }
    }

    /// Route live frames to `sink`.
    pub fn attach_to(&mut self, sink: PreviewSink) -> Result<(), NotOpen> {
        let handle = self.handle.as_mut().ok_or(NotOpen)?;

        if let Some(frame) = handle.grab_frame() {
            sink.send_replace(Some(frame));
        }
        self.sink = Some(sink);
        Ok(())
    }

    /// Push the latest frame into the attached sink. Returns whether a frame
    /// was delivered.
    pub fn pump_preview(&mut self) -> bool {
        let (Some(handle), Some(sink)) = (self.handle.as_mut(), self.sink.as_ref()) else {
            return false;
        };

        match handle.grab_frame() {
            Some(frame) => {
                sink.send_replace(Some(frame));
                true
            }
            None => false,
        }
    }

    pub fn handle_mut(&mut self) -> Option<&mut LiveHandle> {
        self.handle.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }
}

impl Drop for DeviceCameraSession {
    fn drop(&mut self) {
        self.close();
    }
}
