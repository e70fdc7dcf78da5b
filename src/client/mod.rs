mod http;

pub use http::HttpRouteService;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::service::{ActiveRoute, BookingStatusUpdate, ServiceStatusUpdate};

/// Remote backend owning transport services and bookings.
///
/// The info lookups return `Ok(None)` when the transporter has no service in
/// that leg; callers treat any `Err` the same way.
#[async_trait]
pub trait DeliveryRouteService: Send + Sync {
    async fn picking_info(&self, transporter_id: &str) -> Result<Option<ActiveRoute>, AppError>;

    async fn transit_info(&self, transporter_id: &str) -> Result<Option<ActiveRoute>, AppError>;

    async fn update_service_status(&self, update: &ServiceStatusUpdate) -> Result<(), AppError>;

    async fn update_booking_status(&self, update: &BookingStatusUpdate) -> Result<(), AppError>;
}
