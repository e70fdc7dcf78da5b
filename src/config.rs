use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::models::geo::GeoPoint;

pub const DEFAULT_API_BASE_URL: &str = "https://backendagripool4293.pythonanywhere.com";

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub transporter_id: Option<String>,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub event_buffer_size: usize,
    pub device_location: Option<GeoPoint>,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") | Err(_) => LogFormat::Compact,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact/json"
                )));
            }
        };

        let device_location = device_location(
            parse_optional("DEVICE_LAT")?,
            parse_optional("DEVICE_LNG")?,
        )?;

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format,
            api_base_url: env::var("API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_token: non_empty_var("API_TOKEN"),
            transporter_id: non_empty_var("TRANSPORTER_USER_ID"),
            poll_interval: Duration::from_millis(parse_or_default("POLL_INTERVAL_MS", 3000)?),
            request_timeout: Duration::from_millis(parse_or_default("REQUEST_TIMEOUT_MS", 10_000)?),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            device_location,
        })
    }
}

fn device_location(lat: Option<f64>, lng: Option<f64>) -> Result<Option<GeoPoint>, AppError> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => {
            let point = GeoPoint { lat, lng };
            if !point.is_valid() {
                return Err(AppError::Internal(format!(
                    "DEVICE_LAT/DEVICE_LNG out of range: {lat}, {lng}"
                )));
            }
            Ok(Some(point))
        }
        (None, None) => Ok(None),
        _ => Err(AppError::Internal(
            "DEVICE_LAT and DEVICE_LNG must be set together".to_string(),
        )),
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_optional<T>(key: &str) -> Result<Option<T>, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(None),
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
