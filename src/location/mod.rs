use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;
use crate::models::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Device position source. Permission is asked for before the first fix.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn current_position(&self) -> Result<GeoPoint, AppError>;
}

/// Reports a position configured up front.
pub struct FixedLocation {
    point: GeoPoint,
}

impl FixedLocation {
    pub fn new(point: GeoPoint) -> Self {
        Self { point }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Granted
    }

    async fn current_position(&self) -> Result<GeoPoint, AppError> {
        if !self.point.is_valid() {
            return Err(AppError::Internal(format!(
                "configured device location is out of range: {:?}",
                self.point
            )));
        }
        Ok(self.point)
    }
}

/// Device without a usable location source.
pub struct NoLocation;

#[async_trait]
impl LocationProvider for NoLocation {
    async fn request_permission(&self) -> PermissionStatus {
        PermissionStatus::Denied
    }

    async fn current_position(&self) -> Result<GeoPoint, AppError> {
        Err(AppError::PermissionDenied(
            "location access is required to show the map".to_string(),
        ))
    }
}

pub fn provider_for(point: Option<GeoPoint>) -> Arc<dyn LocationProvider> {
    match point {
        Some(point) => Arc::new(FixedLocation::new(point)),
        None => Arc::new(NoLocation),
    }
}
