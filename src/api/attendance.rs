use super::models::{ApiResponse, AttendanceRecord};
use super::{ApiError, AttendanceService};
use crate::api::auth::AuthContext;
use crate::camera::ImageBuffer;
use crate::capture::{AttendanceDay, CaptureSlot};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};

const CHECK_IN: &str = "attendance/check-in";
const TODAY: &str = "attendance/today";
const HISTORY: &str = "attendance/history";

fn check_out_path(attendance_id: &str) -> String {
    format!("attendance/{}/check-out", attendance_id)
}

/// REST client for the attendance backend
#[derive(Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: AuthContext,
}

impl ApiClient {
    pub fn new(base_url: &str, auth: AuthContext, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn auth(&self) -> &AuthContext {
        &self.auth
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, ApiError> {
        debug!(path, "GET");
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(self.auth.bearer_token())
            .send()
            .await?;

        read_response(response).await
    }

    async fn post_photo<T: DeserializeOwned>(
        &self,
        path: &str,
        slot: CaptureSlot,
        image: ImageBuffer,
    ) -> Result<Option<T>, ApiError> {
        debug!(path, bytes = image.len(), "POST photo");
        let part = Part::bytes(image.as_bytes().to_vec())
            .file_name(slot.upload_file_name())
            .mime_str(image.mime_type())?;
        let form = Form::new().part("photo", part);

        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(self.auth.bearer_token())
            .multipart(form)
            .send()
            .await?;

        read_response(response).await
    }

    /// Past attendance of the current user, newest first as the backend sends it
    pub async fn fetch_history(&self) -> Result<Vec<AttendanceDay>, ApiError> {
        let records: Vec<AttendanceRecord> = self.get(HISTORY).await?.unwrap_or_default();
        records.into_iter().map(into_day).collect()
    }
}

#[async_trait]
impl AttendanceService for ApiClient {
    async fn fetch_today(&self) -> Result<Option<AttendanceDay>, ApiError> {
        match self.get::<AttendanceRecord>(TODAY).await {
            Ok(record) => record.map(into_day).transpose(),
            Err(ApiError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn submit_check_in(&self, image: ImageBuffer) -> Result<AttendanceDay, ApiError> {
        let record: Option<AttendanceRecord> =
            self.post_photo(CHECK_IN, CaptureSlot::CheckIn, image).await?;
        let day = into_day(record.ok_or(ApiError::EmptyResponse)?)?;

        info!(attendance_id = %day.id, "Check-in recorded");
        Ok(day)
    }

    async fn submit_check_out(
        &self,
        attendance_id: &str,
        image: ImageBuffer,
    ) -> Result<AttendanceDay, ApiError> {
        if attendance_id.is_empty() {
            return Err(ApiError::MissingAttendanceId);
        }

        let record: Option<AttendanceRecord> = self
            .post_photo(&check_out_path(attendance_id), CaptureSlot::CheckOut, image)
            .await?;
        let day = into_day(record.ok_or(ApiError::EmptyResponse)?)?;

        info!(attendance_id = %day.id, "Check-out recorded");
        Ok(day)
    }
}

fn into_day(record: AttendanceRecord) -> Result<AttendanceDay, ApiError> {
    let day = AttendanceDay::from(record);
    day.validate()
        .map_err(|e| ApiError::InvalidRecord(format!("{} ({})", e, day.id)))?;
    Ok(day)
}

async fn read_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Option<T>, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;
    parse_envelope(status, &body)
}

/// Map a status and body to the envelope's `data`.
pub(crate) fn parse_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> Result<Option<T>, ApiError> {
    match status {
        StatusCode::UNAUTHORIZED => return Err(ApiError::Unauthorized),
        StatusCode::NOT_FOUND => return Err(ApiError::NotFound),
        _ => {}
    }

    let envelope = serde_json::from_slice::<ApiResponse<T>>(body);

    if !status.is_success() {
        let message = match envelope {
            Ok(envelope) if !envelope.message.is_empty() => envelope.message,
            _ => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        return Err(ApiError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let envelope = envelope?;
    if !envelope.success {
        return Err(ApiError::Rejected {
            status: status.as_u16(),
            message: envelope.message,
        });
    }

    Ok(envelope.data)
}
