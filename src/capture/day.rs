use super::CaptureSlot;
use crate::camera::ImageBuffer;
use crate::utils::validation::{InvalidDay, validate_check_times};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

/// Opaque reference to a confirmed photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoRef {
    Url(String),
    Inline(ImageBuffer),
}

/// One user's attendance for a calendar date, as confirmed by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceDay {
    pub id: String,
    pub date: NaiveDate,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub check_in_photo: Option<PhotoRef>,
    pub check_out_photo: Option<PhotoRef>,
}

impl AttendanceDay {
    /// Record with nothing filled yet
    pub fn empty(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date,
            check_in_at: None,
            check_out_at: None,
            check_in_photo: None,
            check_out_photo: None,
        }
    }

    pub fn validate(&self) -> Result<(), InvalidDay> {
        validate_check_times(self.check_in_at, self.check_out_at)
    }

    pub fn is_checked_in(&self) -> bool {
        self.check_in_at.is_some()
    }

    pub fn is_checked_out(&self) -> bool {
        self.check_out_at.is_some()
    }

    pub fn is_filled(&self, slot: CaptureSlot) -> bool {
        match slot {
            CaptureSlot::CheckIn => self.is_checked_in(),
            CaptureSlot::CheckOut => self.is_checked_out(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.is_checked_in() && self.is_checked_out()
    }

    pub fn photo(&self, slot: CaptureSlot) -> Option<&PhotoRef> {
        match slot {
            CaptureSlot::CheckIn => self.check_in_photo.as_ref(),
            CaptureSlot::CheckOut => self.check_out_photo.as_ref(),
        }
    }

    pub fn work_duration(&self) -> Option<TimeDelta> {
        match (self.check_in_at, self.check_out_at) {
            (Some(start), Some(end)) => Some(end.signed_duration_since(start)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, hour, min, 0).unwrap()
    }

    #[test]
    fn slot_filling_follows_timestamps() {
        let mut day = AttendanceDay::empty("a1", NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert!(!day.is_filled(CaptureSlot::CheckIn));
        assert!(!day.is_complete());

        day.check_in_at = Some(at(9, 0));
        assert!(day.is_filled(CaptureSlot::CheckIn));
        assert!(!day.is_filled(CaptureSlot::CheckOut));

        day.check_out_at = Some(at(17, 30));
        assert!(day.is_complete());
        assert_eq!(day.work_duration(), Some(TimeDelta::minutes(8 * 60 + 30)));
    }

    #[test]
    fn check_out_without_check_in_is_invalid() {
        let mut day = AttendanceDay::empty("a1", NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        day.check_out_at = Some(at(17, 0));

        assert!(day.validate().is_err());
    }
}
