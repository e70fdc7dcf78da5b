use serde::{Deserialize, Serialize};

use crate::models::booking::BookingStatus;
use crate::models::service::ServiceStatus;
use crate::models::session::{ControllerState, SessionMode};

/// Notifications for UI clients, streamed over `/ws`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    ModeChanged {
        transporter_id: String,
        from: SessionMode,
        to: SessionMode,
        state: ControllerState,
    },
    NoActiveSession {
        transporter_id: String,
    },
    TransitionRequested {
        transporter_id: String,
        service_id: String,
    },
    MarkersUpdated {
        transporter_id: String,
        markers: usize,
    },
    BookingSelected {
        transporter_id: String,
        booking_id: String,
    },
    OverlayClosed,
    BookingUpdated {
        transporter_id: String,
        booking_id: String,
        status: BookingStatus,
    },
    SessionCompleted {
        transporter_id: String,
        service_id: String,
    },
    LocationPermissionRequested,
    PermissionDenied {
        message: String,
    },
    Alert {
        transporter_id: String,
        message: String,
    },
}

/// Change pushed by the backend, applied through the same reducer as polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    BookingStatusChanged {
        booking_id: String,
        status: BookingStatus,
    },
    ServiceStatusChanged {
        service_id: String,
        status: ServiceStatus,
    },
}
