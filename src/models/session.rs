use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::booking::Booking;
use crate::models::geo::{GeoPoint, GeoRegion};
use crate::models::service::ServiceRecord;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    None,
    Picking,
    InTransit,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    NoSession,
    Picking,
    InTransit,
    TransitioningToInTransit,
    Completed,
}

impl ControllerState {
    pub fn mode(&self) -> SessionMode {
        match self {
            ControllerState::Picking | ControllerState::TransitioningToInTransit => {
                SessionMode::Picking
            }
            ControllerState::InTransit | ControllerState::Completed => SessionMode::InTransit,
            ControllerState::NoSession => SessionMode::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Farmer,
    Buyer,
    Device,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MapMarker {
    pub kind: MarkerKind,
    pub user_id: Option<String>,
    pub point: GeoPoint,
    pub label: String,
    /// Distance from the device position, when known.
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MapView {
    pub region: Option<GeoRegion>,
    pub markers: Vec<MapMarker>,
    /// Stops in visiting order; drawn as a polyline once it has two points.
    pub route: Vec<GeoPoint>,
    pub route_length_km: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySession {
    pub session_id: Uuid,
    pub transporter_id: String,
    pub mode: SessionMode,
    pub state: ControllerState,
    pub service: ServiceRecord,
    pub bookings: Vec<Booking>,
    pub region: Option<GeoRegion>,
    pub map: MapView,
    /// Sequence number of the poll this session state was derived from.
    pub poll_seq: u64,
    pub updated_at: DateTime<Utc>,
}

impl DeliverySession {
    pub fn booking(&self, booking_id: &str) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.booking_id == booking_id)
    }

    pub fn all_bookings_completed(&self) -> bool {
        !self.bookings.is_empty() && self.bookings.iter().all(Booking::is_completed)
    }
}
