use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidDay {
    #[error("check-out recorded without a check-in")]
    CheckOutWithoutCheckIn,
    #[error("check-out must not be earlier than check-in")]
    CheckOutBeforeCheckIn,
}

pub fn validate_check_times(
    check_in: Option<DateTime<Utc>>,
    check_out: Option<DateTime<Utc>>,
) -> Result<(), InvalidDay> {
    match (check_in, check_out) {
        (None, Some(_)) => Err(InvalidDay::CheckOutWithoutCheckIn),
        (Some(start), Some(end)) if end < start => Err(InvalidDay::CheckOutBeforeCheckIn),
        _ => Ok(()),
    }
}
