use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::Receiver;

use crate::client::DeliveryRouteService;
use crate::engine::controller::RouteSessionController;
use crate::engine::events::SessionEvent;
use crate::error::AppError;
use crate::location::FixedLocation;
use crate::models::booking::{Booking, BookingStatus};
use crate::models::geo::{GeoPoint, StopLocation};
use crate::models::service::{
    ActiveRoute, BookingStatusUpdate, ServiceRecord, ServiceStatus, ServiceStatusUpdate,
};
use crate::state::AppState;

#[derive(Clone)]
pub enum Lookup {
    Found(ActiveRoute),
    NotFound,
    Fails,
}

impl Lookup {
    fn result(&self) -> Result<Option<ActiveRoute>, AppError> {
        match self {
            Lookup::Found(route) => Ok(Some(route.clone())),
            Lookup::NotFound => Ok(None),
            Lookup::Fails => Err(AppError::Network("connection refused".to_string())),
        }
    }
}

/// In-memory backend recording every request it receives.
pub struct FakeRoutes {
    picking: Mutex<Lookup>,
    transit: Mutex<Lookup>,
    lookups: AtomicUsize,
    service_updates: Mutex<Vec<ServiceStatusUpdate>>,
    booking_updates: Mutex<Vec<BookingStatusUpdate>>,
    pub reject_services: AtomicBool,
    pub reject_bookings: AtomicBool,
}

impl FakeRoutes {
    pub fn new(picking: Lookup, transit: Lookup) -> Arc<Self> {
        Arc::new(Self {
            picking: Mutex::new(picking),
            transit: Mutex::new(transit),
            lookups: AtomicUsize::new(0),
            service_updates: Mutex::new(Vec::new()),
            booking_updates: Mutex::new(Vec::new()),
            reject_services: AtomicBool::new(false),
            reject_bookings: AtomicBool::new(false),
        })
    }

    pub fn set_picking(&self, lookup: Lookup) {
        *self.picking.lock().unwrap() = lookup;
    }

    pub fn set_transit(&self, lookup: Lookup) {
        *self.transit.lock().unwrap() = lookup;
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn service_updates(&self) -> Vec<ServiceStatusUpdate> {
        self.service_updates.lock().unwrap().clone()
    }

    pub fn booking_updates(&self) -> Vec<BookingStatusUpdate> {
        self.booking_updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryRouteService for FakeRoutes {
    async fn picking_info(&self, _transporter_id: &str) -> Result<Option<ActiveRoute>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.picking.lock().unwrap().result()
    }

    async fn transit_info(&self, _transporter_id: &str) -> Result<Option<ActiveRoute>, AppError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.transit.lock().unwrap().result()
    }

    async fn update_service_status(&self, update: &ServiceStatusUpdate) -> Result<(), AppError> {
        self.service_updates.lock().unwrap().push(update.clone());
        if self.reject_services.load(Ordering::SeqCst) {
            return Err(AppError::ServerRejection {
                status: 500,
                message: "service update failed".to_string(),
            });
        }
        Ok(())
    }

    async fn update_booking_status(&self, update: &BookingStatusUpdate) -> Result<(), AppError> {
        self.booking_updates.lock().unwrap().push(update.clone());
        if self.reject_bookings.load(Ordering::SeqCst) {
            return Err(AppError::ServerRejection {
                status: 400,
                message: "booking already closed".to_string(),
            });
        }
        Ok(())
    }
}

pub fn booking(id: &str, status: BookingStatus) -> Booking {
    Booking {
        booking_id: id.to_string(),
        farmer_user_id: Some(format!("farmer-{id}")),
        buyer_user_id: Some(format!("buyer-{id}")),
        status,
        address: None,
        phone: None,
        distance_km: None,
        total_price: None,
    }
}

pub fn route(service_id: &str, bookings: Vec<Booking>) -> ActiveRoute {
    ActiveRoute {
        service: ServiceRecord {
            service_id: service_id.to_string(),
            vehicle_plate: Some("KDA 123X".to_string()),
            farmer_locations: vec![StopLocation {
                user_id: Some("farmer-b1".to_string()),
                lat: Some(-1.2921),
                lng: Some(36.8219),
                address: Some("Limuru Road".to_string()),
            }],
            buyer_locations: vec![StopLocation {
                user_id: Some("buyer-b1".to_string()),
                lat: Some(-1.1),
                lng: Some(37.0),
                address: None,
            }],
            status: ServiceStatus::Picking,
        },
        bookings,
    }
}

pub fn controller(routes: Arc<FakeRoutes>) -> (RouteSessionController, Receiver<SessionEvent>) {
    let state = Arc::new(AppState::new(64));
    let rx = state.events_tx.subscribe();
    let controller = RouteSessionController::new(
        state,
        routes,
        Arc::new(FixedLocation::new(GeoPoint {
            lat: -1.28,
            lng: 36.82,
        })),
    );
    (controller, rx)
}

pub fn drain(rx: &mut Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            Err(TryRecvError::Lagged(_)) => continue,
        }
    }
    events
}
