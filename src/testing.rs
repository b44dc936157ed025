//! Scripted stand-ins for the camera and the attendance backend.

use crate::api::{ApiError, AttendanceService};
use crate::camera::snapshot::encode_png;
use crate::camera::{CameraBackend, DeviceError, Frame, ImageBuffer, StreamRequest, VideoStream};
use crate::capture::{AttendanceDay, PhotoRef};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Poll `condition` until it holds, failing the test after five seconds.
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// 4x3 RGBA frame with a fixed gradient
pub fn test_frame() -> Frame {
    let (width, height) = (4u32, 3u32);
    let pixels = (0..width * height)
        .flat_map(|i| {
            let v = (i * 20) as u8;
            [v, 255 - v, v / 2, 255]
        })
        .collect();
    Frame::new(width, height, pixels)
}

pub fn test_image() -> ImageBuffer {
    encode_png(&test_frame()).unwrap()
}

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
}

pub fn checked_in_day() -> AttendanceDay {
    let mut day = AttendanceDay::empty("att-1", test_date());
    day.check_in_at = Some(Utc.with_ymd_and_hms(2025, 4, 1, 9, 0, 0).unwrap());
    day.check_in_photo = Some(PhotoRef::Url(
        "https://files.example.test/att-1/checkin.png".to_string(),
    ));
    day
}

pub fn checked_out_day() -> AttendanceDay {
    let mut day = checked_in_day();
    day.check_out_at = Some(Utc.with_ymd_and_hms(2025, 4, 1, 17, 30, 0).unwrap());
    day.check_out_photo = Some(PhotoRef::Url(
        "https://files.example.test/att-1/checkout.png".to_string(),
    ));
    day
}

/// Camera backend with counters and queued failures.
pub struct ScriptedBackend {
    frames: bool,
    failures: Mutex<VecDeque<DeviceError>>,
    gate: Option<(Mutex<mpsc::Sender<()>>, Mutex<mpsc::Receiver<()>>)>,
    open_calls: AtomicUsize,
    stop_calls: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    last_request: Mutex<Option<StreamRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            frames: true,
            failures: Mutex::new(VecDeque::new()),
            gate: None,
            open_calls: AtomicUsize::new(0),
            stop_calls: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
            last_request: Mutex::new(None),
        }
    }

    /// Streams never deliver a frame
    pub fn without_frames(mut self) -> Self {
        self.frames = false;
        self
    }

    /// Every `open` blocks until [`release_open`](Self::release_open)
    pub fn hold_opens(mut self) -> Self {
        let (tx, rx) = mpsc::channel();
        self.gate = Some((Mutex::new(tx), Mutex::new(rx)));
        self
    }

    pub fn release_open(&self) {
        if let Some((tx, _)) = &self.gate {
            tx.lock().unwrap().send(()).unwrap();
        }
    }

    /// The next `open` fails with `error`
    pub fn push_failure(&self, error: DeviceError) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn live_streams(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<StreamRequest> {
        *self.last_request.lock().unwrap()
    }
}

impl CameraBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&self, request: &StreamRequest) -> Result<Box<dyn VideoStream>, DeviceError> {
        *self.last_request.lock().unwrap() = Some(*request);
        self.open_calls.fetch_add(1, Ordering::SeqCst);

        if let Some((_, rx)) = &self.gate {
            let _ = rx.lock().unwrap().recv();
        }

        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedStream {
            frame: self.frames.then(test_frame),
            live: Arc::clone(&self.live),
            stop_calls: Arc::clone(&self.stop_calls),
            stopped: false,
        }))
    }
}

struct ScriptedStream {
    frame: Option<Frame>,
    live: Arc<AtomicUsize>,
    stop_calls: Arc<AtomicUsize>,
    stopped: bool,
}

impl VideoStream for ScriptedStream {
    fn resolution(&self) -> (u32, u32) {
        let frame = test_frame();
        (frame.width, frame.height)
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.stopped {
            return None;
        }
        self.frame.clone()
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Attendance backend answering from queues. Without a queued result,
/// check-in returns [`checked_in_day`] and check-out [`checked_out_day`].
pub struct FakeAttendanceService {
    today: Mutex<Option<AttendanceDay>>,
    check_in: Mutex<VecDeque<Result<AttendanceDay, ApiError>>>,
    check_out: Mutex<VecDeque<Result<AttendanceDay, ApiError>>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Semaphore>,
}

impl FakeAttendanceService {
    pub fn new() -> Self {
        Self {
            today: Mutex::new(None),
            check_in: Mutex::new(VecDeque::new()),
            check_out: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Submissions wait for [`release_submissions`](Self::release_submissions)
    pub fn hold_submissions(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release_submissions(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    pub fn set_today(&self, day: Option<AttendanceDay>) {
        *self.today.lock().unwrap() = day;
    }

    pub fn push_check_out(&self, result: Result<AttendanceDay, ApiError>) {
        self.check_out.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn wait_for_release(&self) {
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
    }
}

#[async_trait]
impl AttendanceService for FakeAttendanceService {
    async fn fetch_today(&self) -> Result<Option<AttendanceDay>, ApiError> {
        self.record("today".to_string());
        Ok(self.today.lock().unwrap().clone())
    }

    async fn submit_check_in(&self, _image: ImageBuffer) -> Result<AttendanceDay, ApiError> {
        self.record("check-in".to_string());
        self.wait_for_release().await;
        let queued = self.check_in.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(checked_in_day()))
    }

    async fn submit_check_out(
        &self,
        attendance_id: &str,
        _image: ImageBuffer,
    ) -> Result<AttendanceDay, ApiError> {
        self.record(format!("check-out:{}", attendance_id));
        self.wait_for_release().await;
        let queued = self.check_out.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| Ok(checked_out_day()))
    }
}
