use crate::capture::{AttendanceDay, PhotoRef};
use crate::utils::time::deserialize_api_date;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Envelope every endpoint answers with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub email: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub user: Option<UserInfo>,
    #[serde(deserialize_with = "deserialize_api_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub check_in_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check_out_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub check_in_photo_url: Option<String>,
    #[serde(default)]
    pub check_out_photo_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<AttendanceRecord> for AttendanceDay {
    fn from(record: AttendanceRecord) -> Self {
        AttendanceDay {
            id: record.id,
            date: record.date,
            check_in_at: record.check_in_time,
            check_out_at: record.check_out_time,
            check_in_photo: non_empty(record.check_in_photo_url).map(PhotoRef::Url),
            check_out_photo: non_empty(record.check_out_photo_url).map(PhotoRef::Url),
        }
    }
}

// The backend sends "" and null interchangeably for missing photos
fn non_empty(url: Option<String>) -> Option<String> {
    url.filter(|u| !u.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_record_with_missing_check_out() {
        let json = r#"{
            "id": "att-1",
            "userId": "u-1",
            "date": "2025-04-01T00:00:00.000Z",
            "checkInTime": "2025-04-01T08:58:12.000Z",
            "checkOutTime": null,
            "checkInPhotoUrl": "https://cdn.example.com/in.png",
            "checkOutPhotoUrl": null,
            "createdAt": "2025-04-01T08:58:12.000Z",
            "updatedAt": "2025-04-01T08:58:12.000Z"
        }"#;

        let record: AttendanceRecord = serde_json::from_str(json).unwrap();
        let day = AttendanceDay::from(record);

        assert_eq!(day.date, NaiveDate::from_ymd_opt(2025, 4, 1).unwrap());
        assert!(day.is_checked_in());
        assert!(!day.is_checked_out());
        assert_eq!(
            day.check_in_photo,
            Some(PhotoRef::Url("https://cdn.example.com/in.png".to_string()))
        );
        assert_eq!(day.check_out_photo, None);
    }

    #[test]
    fn absent_and_empty_photo_fields_are_none() {
        let json = r#"{
            "id": "att-2",
            "userId": "u-1",
            "date": "2025-04-02",
            "checkInTime": "2025-04-02T09:00:00Z",
            "checkInPhotoUrl": ""
        }"#;

        let day = AttendanceDay::from(serde_json::from_str::<AttendanceRecord>(json).unwrap());

        assert_eq!(day.check_in_photo, None);
        assert_eq!(day.check_out_photo, None);
        assert_eq!(day.check_out_at, None);
    }

    #[test]
    fn envelope_without_data_is_empty() {
        let body = r#"{ "success": true, "message": "No attendance today" }"#;

        let response: ApiResponse<AttendanceRecord> = serde_json::from_str(body).unwrap();

        assert!(response.success);
        assert!(response.data.is_none());
    }
}
