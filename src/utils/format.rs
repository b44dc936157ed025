use crate::capture::AttendanceDay;
use crate::utils::time::{format_duration, format_time_local};
use chrono::{Days, NaiveDate};

const EMPTY_TIME: &str = "--:--:--";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStatus {
    CheckedIn,
    NotCheckedIn,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub status: HistoryStatus,
}

pub fn format_today_status(day: Option<&AttendanceDay>) -> String {
    let check_in = day.and_then(|d| d.check_in_at);
    let check_out = day.and_then(|d| d.check_out_at);
    let duration = day.and_then(AttendanceDay::work_duration);

    let mut status = String::from("**Today's Status**\n");
    status.push_str(&format!(
        "{} Check In:      {}\n",
        status_icon(check_in.is_some()),
        check_in.map(format_time_local).unwrap_or_else(|| EMPTY_TIME.to_string())
    ));
    status.push_str(&format!(
        "{} Check Out:     {}\n",
        status_icon(check_out.is_some()),
        check_out.map(format_time_local).unwrap_or_else(|| EMPTY_TIME.to_string())
    ));
    status.push_str(&format!(
        "⏱️ Work Duration: {}",
        duration.map(format_duration).unwrap_or_else(|| EMPTY_TIME.to_string())
    ));

    status
}

fn status_icon(done: bool) -> &'static str {
    if done { "✅" } else { "🕐" }
}

/// One entry per day for the `days` days before `today`, newest first.
/// Days without a record show as not checked in.
pub fn summarize_history(records: &[AttendanceDay], today: NaiveDate, days: u64) -> Vec<HistoryEntry> {
    (1..=days)
        .filter_map(|offset| today.checked_sub_days(Days::new(offset)))
        .map(|date| {
            let record = records.iter().find(|r| r.date == date);
            let check_in = record.and_then(|r| r.check_in_at).map(format_time_local);
            let check_out = record.and_then(|r| r.check_out_at).map(format_time_local);
            let status = if check_in.is_some() && check_out.is_some() {
                HistoryStatus::CheckedIn
            } else {
                HistoryStatus::NotCheckedIn
            };

            HistoryEntry {
                date,
                check_in,
                check_out,
                status,
            }
        })
        .collect()
}

pub fn format_history(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No attendance history".to_string();
    }

    let mut summary = String::from("**Recent Attendance**\n");
    for entry in entries {
        let marker = match entry.status {
            HistoryStatus::CheckedIn => "✅",
            HistoryStatus::NotCheckedIn => "⚠️",
        };
        summary.push_str(&format!(
            "{} {}  in {}  out {}\n",
            marker,
            entry.date.format("%a, %b %-d"),
            entry.check_in.as_deref().unwrap_or(EMPTY_TIME),
            entry.check_out.as_deref().unwrap_or(EMPTY_TIME),
        ));
    }

    summary.trim_end().to_string()
}

pub fn format_error_message(error: &str) -> String {
    format!("❌ **Error**: {}", error)
}

pub fn format_success_message(message: &str) -> String {
    format!("✅ {}", message)
}

pub fn format_info_message(message: &str) -> String {
    format!("ℹ️ {}", message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{checked_in_day, checked_out_day};

    #[test]
    fn status_without_record_shows_placeholders() {
        let status = format_today_status(None);

        assert_eq!(status.matches(EMPTY_TIME).count(), 3);
    }

    #[test]
    fn status_with_full_day_shows_duration() {
        let day = checked_out_day();

        let status = format_today_status(Some(&day));

        assert!(status.contains("Work Duration: 08:30:00"));
        assert_eq!(status.matches(EMPTY_TIME).count(), 0);
    }

    #[test]
    fn history_covers_previous_days_only() {
        let today = checked_out_day().date;
        let mut yesterday = checked_out_day();
        yesterday.date = today.pred_opt().unwrap();
        let mut two_days_ago = checked_in_day();
        two_days_ago.date = today.checked_sub_days(Days::new(2)).unwrap();

        let entries = summarize_history(&[checked_out_day(), yesterday, two_days_ago], today, 4);

        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].date, today.pred_opt().unwrap());
        assert_eq!(entries[0].status, HistoryStatus::CheckedIn);
        assert_eq!(entries[1].status, HistoryStatus::NotCheckedIn);
        assert!(entries[1].check_in.is_some());
        assert_eq!(entries[3].check_in, None);
        assert!(entries.iter().all(|e| e.date < today));
    }

    #[test]
    fn history_lines_are_rendered_per_day() {
        let today = checked_out_day().date;
        let entries = summarize_history(&[], today, 4);

        let text = format_history(&entries);

        assert_eq!(text.lines().count(), 5);
    }
}
