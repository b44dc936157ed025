use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraSource {
    /// Physical camera by platform index
    Webcam { device: u32 },
    /// Virtual camera serving a still image
    File(PathBuf),
}

impl std::fmt::Display for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraSource::Webcam { device } => write!(f, "webcam {}", device),
            CameraSource::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub access_token: String,
    pub camera: CameraSource,
    pub preview_interval: Duration,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url = lookup("API_BASE_URL")
            .ok_or_else(|| anyhow::anyhow!("API_BASE_URL environment variable is required"))?;

        let access_token = lookup("ACCESS_TOKEN")
            .ok_or_else(|| anyhow::anyhow!("ACCESS_TOKEN environment variable is required"))?;

        let camera = match lookup("CAMERA").as_deref().map(str::trim) {
            None | Some("webcam") => {
                let device = match lookup("CAMERA_DEVICE") {
                    Some(raw) => raw.trim().parse::<u32>().map_err(|_| {
                        anyhow::anyhow!("CAMERA_DEVICE must be a camera index, got {:?}", raw)
                    })?,
                    None => 0,
                };
                CameraSource::Webcam { device }
            }
            Some("file") => CameraSource::File(
                lookup("CAMERA_SOURCE")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("camera.png")),
            ),
            Some(other) => {
                return Err(anyhow::anyhow!(
                    "CAMERA must be \"webcam\" or \"file\", got {:?}",
                    other
                ));
            }
        };

        let preview_interval = match lookup("PREVIEW_INTERVAL_MS") {
            Some(raw) => Duration::from_millis(parse_positive("PREVIEW_INTERVAL_MS", &raw)?),
            None => Duration::from_millis(500),
        };

        let request_timeout = match lookup("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("REQUEST_TIMEOUT_SECS", &raw)?),
            None => Duration::from_secs(30),
        };

        Ok(Config {
            api_base_url,
            access_token,
            camera,
            preview_interval,
            request_timeout,
        })
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(anyhow::anyhow!("{} must be a positive integer, got {:?}", key, raw)),
    }
}
