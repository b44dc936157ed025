pub mod attendance;
pub mod auth;
pub mod models;

pub use attendance::ApiClient;
pub use auth::{AuthContext, AuthUser};

use crate::camera::ImageBuffer;
use crate::capture::AttendanceDay;
use crate::config::Config;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session expired, please sign in again")]
    Unauthorized,
    #[error("Not found")]
    NotFound,
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("Attendance ID is missing")]
    MissingAttendanceId,
    #[error("Server returned no attendance record")]
    EmptyResponse,
    #[error("Invalid attendance record: {0}")]
    InvalidRecord(String),
    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),
}

/// The backend calls the capture flow depends on.
#[async_trait]
pub trait AttendanceService: Send + Sync {
    /// Today's record for the current user, `None` before the first check-in
    async fn fetch_today(&self) -> Result<Option<AttendanceDay>, ApiError>;

    async fn submit_check_in(&self, image: ImageBuffer) -> Result<AttendanceDay, ApiError>;

    async fn submit_check_out(
        &self,
        attendance_id: &str,
        image: ImageBuffer,
    ) -> Result<AttendanceDay, ApiError>;
}

pub fn create_client(config: &Config) -> anyhow::Result<ApiClient> {
    let auth = AuthContext::from_token(&config.access_token)?;
    tracing::info!(user = %auth.user().email, "Authenticated");

    let client = ApiClient::new(&config.api_base_url, auth, config.request_timeout)?;
    Ok(client)
}
