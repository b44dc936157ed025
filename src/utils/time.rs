use chrono::{DateTime, Local, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Deserializer};

pub fn get_current_date_local() -> NaiveDate {
    Local::now().date_naive()
}

/// Accepts "2025-04-01" as well as a full RFC 3339 timestamp
pub fn parse_api_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }

    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

pub fn deserialize_api_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_api_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date: {}", raw)))
}

pub fn format_time_local(datetime: DateTime<Utc>) -> String {
    datetime.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// "Tuesday, April 1, 2025"
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

/// Work duration as HH:MM:SS; negative spans clamp to zero
pub fn format_duration(duration: TimeDelta) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
