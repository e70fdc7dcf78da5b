use serde::{Deserialize, Serialize};

use crate::models::booking::Booking;
use crate::models::geo::StopLocation;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Open,
    Full,
    Picking,
    #[serde(alias = "inTransit")]
    InTransit,
    #[serde(alias = "Dropping")]
    Dropping,
    #[serde(alias = "Completed")]
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRecord {
    pub service_id: String,
    #[serde(default, alias = "vehicle_description")]
    pub vehicle_plate: Option<String>,
    #[serde(default)]
    pub farmer_locations: Vec<StopLocation>,
    #[serde(default)]
    pub buyer_locations: Vec<StopLocation>,
    pub status: ServiceStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceHeader {
    pub service_id: String,
    #[serde(default, alias = "vehicle_description")]
    pub vehicle_plate: Option<String>,
    pub status: ServiceStatus,
}

/// Body returned by both `get_picking_routes_info` and `get_transit_routes_info`.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteInfo {
    pub service: Option<ServiceHeader>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
    #[serde(default)]
    pub farmers_locations: Vec<StopLocation>,
    #[serde(default)]
    pub buyers_locations: Vec<StopLocation>,
}

/// An active service together with its bookings, as adopted into a session.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveRoute {
    pub service: ServiceRecord,
    pub bookings: Vec<Booking>,
}

impl RouteInfo {
    /// `None` when the payload carries no service, which the backend uses
    /// as an alternative to a 404.
    pub fn into_active_route(self) -> Option<ActiveRoute> {
        let header = self.service?;
        Some(ActiveRoute {
            service: ServiceRecord {
                service_id: header.service_id,
                vehicle_plate: header.vehicle_plate,
                farmer_locations: self.farmers_locations,
                buyer_locations: self.buyers_locations,
                status: header.status,
            },
            bookings: self.bookings,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatusUpdate {
    pub service_id: String,
    pub status: ServiceStatus,
    pub transporter_user_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingStatusUpdate {
    pub service_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub farmers_user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buyers_user_id: Option<String>,
    pub status: crate::models::booking::BookingStatus,
}
