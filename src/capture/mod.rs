pub mod day;
pub mod machine;
pub mod presenter;
pub mod state;

pub use day::{AttendanceDay, PhotoRef};
pub use machine::{CaptureStateMachine, Effect, Rejected, SubmissionError};
pub use presenter::{
    AttendanceCapturePresenter, CaptureView, Notice, NoticeKind, PresenterError, PresenterEvent,
    PreviewRegion,
};
pub use state::{CaptureSlot, CaptureState};
