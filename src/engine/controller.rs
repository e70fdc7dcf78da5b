use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::DeliveryRouteService;
use crate::engine::decision::{decide, Decision};
use crate::engine::events::{PushEvent, SessionEvent};
use crate::engine::reducer::{PollResult, SessionInput};
use crate::error::AppError;
use crate::location::{LocationProvider, PermissionStatus};
use crate::models::booking::{Booking, BookingParty, BookingStatus};
use crate::models::service::{
    ActiveRoute, BookingStatusUpdate, ServiceStatus, ServiceStatusUpdate,
};
use crate::models::session::{ControllerState, DeliverySession, SessionMode};
use crate::state::{AppState, Selection};

/// Drives one transporter's delivery session from the two route info
/// endpoints, and sends the status updates the session calls for.
pub struct RouteSessionController {
    state: Arc<AppState>,
    service: Arc<dyn DeliveryRouteService>,
    location: Arc<dyn LocationProvider>,
    /// transporter id -> in_transit request already issued for a service
    transitions: Mutex<HashMap<String, IssuedTransition>>,
    /// transporter id -> service whose completion the backend rejected
    failed_completions: Mutex<HashMap<String, String>>,
    permission_requested: AtomicBool,
}

/// An `in_transit` request sent (or in flight) for one service. A rejected
/// request stays recorded so polling does not resend it.
#[derive(Debug, Clone)]
struct IssuedTransition {
    service_id: String,
    accepted: bool,
}

impl RouteSessionController {
    pub fn new(
        state: Arc<AppState>,
        service: Arc<dyn DeliveryRouteService>,
        location: Arc<dyn LocationProvider>,
    ) -> Self {
        Self {
            state,
            service,
            location,
            transitions: Mutex::new(HashMap::new()),
            failed_completions: Mutex::new(HashMap::new()),
            permission_requested: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// One poll cycle: reconcile, then close out the session if every
    /// booking is done. A completion the backend already rejected is not
    /// resent from here.
    pub async fn tick(&self, transporter_id: &str) -> ControllerState {
        let state = self.reconcile(transporter_id).await;
        if self.completion_rejected(transporter_id).await {
            return state;
        }
        match self.try_complete_session(transporter_id).await {
            Ok(true) => self.current_state(transporter_id),
            Ok(false) => state,
            Err(err) => {
                warn!(transporter_id, error = %err, "session completion failed");
                state
            }
        }
    }

    pub async fn reconcile(&self, transporter_id: &str) -> ControllerState {
        let transporter_id = transporter_id.trim();
        if transporter_id.is_empty() {
            self.state.emit(SessionEvent::NoActiveSession {
                transporter_id: String::new(),
            });
            return ControllerState::NoSession;
        }

        let start = Instant::now();
        let seq = self.state.next_seq();

        let (picking, transit) = tokio::join!(
            self.service.picking_info(transporter_id),
            self.service.transit_info(transporter_id),
        );
        let picking = found_or_none("picking", transporter_id, picking);
        let transit = found_or_none("transit", transporter_id, transit);

        self.ensure_device_location().await;

        let issued = self.transitions.lock().await.get(transporter_id).cloned();
        let decision = decide(picking, transit, |service_id| {
            issued.as_ref().is_some_and(|t| t.service_id == service_id)
        });

        let (next, route) = match decision {
            Decision::RequestInTransit(route) => {
                if self.request_in_transit(transporter_id, &route).await {
                    (ControllerState::TransitioningToInTransit, Some(route))
                } else {
                    (ControllerState::Picking, Some(route))
                }
            }
            Decision::AwaitInTransit(route) => {
                if issued.as_ref().is_some_and(|t| t.accepted) {
                    debug!(
                        transporter_id,
                        service_id = %route.service.service_id,
                        "waiting for transit info after status update"
                    );
                    (ControllerState::TransitioningToInTransit, Some(route))
                } else {
                    (ControllerState::Picking, Some(route))
                }
            }
            Decision::Picking(route) => (ControllerState::Picking, Some(route)),
            Decision::InTransit(route) => (ControllerState::InTransit, Some(route)),
            Decision::NoSession => (ControllerState::NoSession, None),
        };

        if let Some(route) = &route {
            self.forget_other_service(transporter_id, &route.service.service_id)
                .await;
        }

        let reduction = self
            .state
            .apply(
                transporter_id,
                seq,
                SessionInput::Poll(PollResult { state: next, route }),
            )
            .await;

        let outcome = if reduction.applied {
            state_label(next)
        } else {
            debug!(transporter_id, seq, "dropped superseded poll result");
            "stale"
        };
        self.state.metrics.polls_total.with_label_values(&[outcome]).inc();
        self.state
            .metrics
            .reconcile_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());

        self.current_state(transporter_id)
    }

    /// Marks the service completed once every booking is. Returns whether
    /// the completion request was sent.
    pub async fn try_complete_session(&self, transporter_id: &str) -> Result<bool, AppError> {
        let Some(session) = self.state.session(transporter_id) else {
            return Ok(false);
        };
        if session.state == ControllerState::Completed || !session.all_bookings_completed() {
            return Ok(false);
        }

        let service_id = session.service.service_id.clone();
        let update = ServiceStatusUpdate {
            service_id: service_id.clone(),
            status: ServiceStatus::Completed,
            transporter_user_id: transporter_id.to_string(),
        };

        let result = self.service.update_service_status(&update).await;
        self.state
            .metrics
            .record_status_update("service", result.is_ok());
        if let Err(err) = result {
            warn!(transporter_id, service_id = %service_id, error = %err, "failed to complete service");
            self.alert(transporter_id, &err);
            self.failed_completions
                .lock()
                .await
                .insert(transporter_id.to_string(), service_id);
            return Err(err);
        }

        info!(transporter_id, service_id = %service_id, "service completed");
        self.failed_completions.lock().await.remove(transporter_id);

        let seq = self.state.next_seq();
        self.state
            .apply(
                transporter_id,
                seq,
                SessionInput::Push(PushEvent::ServiceStatusChanged {
                    service_id: service_id.clone(),
                    status: ServiceStatus::Completed,
                }),
            )
            .await;
        self.transitions.lock().await.remove(transporter_id);

        self.reconcile(transporter_id).await;
        Ok(true)
    }

    /// Reports a new status for one booking of the active session.
    pub async fn update_booking_status(
        &self,
        transporter_id: &str,
        booking_id: &str,
        status: BookingStatus,
    ) -> Result<DeliverySession, AppError> {
        if booking_id.trim().is_empty() {
            return Err(AppError::Validation("no booking selected".to_string()));
        }

        let session = self.state.session(transporter_id).ok_or_else(|| {
            AppError::Validation("no active service selected".to_string())
        })?;
        let booking = session.booking(booking_id).ok_or_else(|| {
            AppError::Validation(format!(
                "booking {booking_id} is not part of service {}",
                session.service.service_id
            ))
        })?;

        let update = booking_update(&session, booking, status)?;
        let result = self.service.update_booking_status(&update).await;
        self.state
            .metrics
            .record_status_update("booking", result.is_ok());

        if let Err(err) = result {
            warn!(transporter_id, booking_id, error = %err, "booking status update failed");
            self.alert(transporter_id, &err);
            return Err(err);
        }

        info!(
            transporter_id,
            booking_id,
            status = status.as_str(),
            "booking status updated"
        );

        let seq = self.state.next_seq();
        self.state
            .apply(
                transporter_id,
                seq,
                SessionInput::Push(PushEvent::BookingStatusChanged {
                    booking_id: booking_id.to_string(),
                    status,
                }),
            )
            .await;
        let updated = self.state.session(transporter_id);
        self.close_overlay().await;

        if let Err(err) = self.try_complete_session(transporter_id).await {
            debug!(transporter_id, error = %err, "completion deferred to next poll");
        }

        updated.ok_or_else(|| AppError::NotFound(format!("no session for {transporter_id}")))
    }

    /// Confirms the booking open in the overlay: picked up while picking,
    /// delivered while in transit.
    pub async fn confirm_selected_booking(
        &self,
        transporter_id: &str,
    ) -> Result<DeliverySession, AppError> {
        let selection = self
            .state
            .selection()
            .await
            .filter(|s| s.transporter_id == transporter_id)
            .ok_or_else(|| AppError::Validation("no booking selected".to_string()))?;

        let mode = self
            .state
            .session(transporter_id)
            .map(|s| s.mode)
            .unwrap_or(SessionMode::None);
        let status = match mode {
            SessionMode::Picking => BookingStatus::InTransit,
            SessionMode::InTransit => BookingStatus::Completed,
            SessionMode::None => {
                return Err(AppError::Validation(
                    "no active service selected".to_string(),
                ));
            }
        };

        self.update_booking_status(transporter_id, &selection.booking_id, status)
            .await
    }

    pub async fn select_booking(
        &self,
        transporter_id: &str,
        booking_id: &str,
    ) -> Result<Booking, AppError> {
        let booking = self
            .state
            .session(transporter_id)
            .and_then(|s| s.booking(booking_id).cloned())
            .ok_or_else(|| AppError::NotFound(format!("booking {booking_id} not found")))?;

        self.state
            .select(Selection {
                transporter_id: transporter_id.to_string(),
                booking_id: booking_id.to_string(),
            })
            .await;
        self.state.emit(SessionEvent::BookingSelected {
            transporter_id: transporter_id.to_string(),
            booking_id: booking_id.to_string(),
        });

        Ok(booking)
    }

    pub async fn close_overlay(&self) {
        self.state.close_overlay().await;
        self.state.emit(SessionEvent::OverlayClosed);
    }

    /// Feeds a backend push through the session reducer.
    pub async fn apply_push(&self, transporter_id: &str, push: PushEvent) -> bool {
        let seq = self.state.next_seq();
        let applied = self
            .state
            .apply(transporter_id, seq, SessionInput::Push(push))
            .await
            .applied;

        if applied && !self.completion_rejected(transporter_id).await {
            if let Err(err) = self.try_complete_session(transporter_id).await {
                debug!(transporter_id, error = %err, "completion deferred to next poll");
            }
        }
        applied
    }

    /// Signs a transporter in and runs a first reconcile for them.
    pub async fn sign_in(&self, transporter_id: &str) -> ControllerState {
        let transporter_id = transporter_id.trim();
        self.state
            .set_transporter_id(Some(transporter_id.to_string()))
            .await;
        info!(transporter_id, "transporter signed in");
        self.tick(transporter_id).await
    }

    fn current_state(&self, transporter_id: &str) -> ControllerState {
        self.state
            .session(transporter_id)
            .map(|s| s.state)
            .unwrap_or(ControllerState::NoSession)
    }

    /// Sends the `in_transit` request at most once per service. Returns
    /// whether the backend accepted it.
    async fn request_in_transit(&self, transporter_id: &str, route: &ActiveRoute) -> bool {
        let service_id = route.service.service_id.clone();
        {
            let mut transitions = self.transitions.lock().await;
            if let Some(issued) = transitions
                .get(transporter_id)
                .filter(|t| t.service_id == service_id)
            {
                return issued.accepted;
            }
            transitions.insert(
                transporter_id.to_string(),
                IssuedTransition {
                    service_id: service_id.clone(),
                    accepted: false,
                },
            );
        }

        let update = ServiceStatusUpdate {
            service_id: service_id.clone(),
            status: ServiceStatus::InTransit,
            transporter_user_id: transporter_id.to_string(),
        };

        let result = self.service.update_service_status(&update).await;
        self.state
            .metrics
            .record_status_update("service", result.is_ok());

        match result {
            Ok(()) => {
                info!(transporter_id, service_id = %service_id, "all bookings picked; service moved to in_transit");
                if let Some(issued) = self.transitions.lock().await.get_mut(transporter_id) {
                    issued.accepted = true;
                }
                self.state.emit(SessionEvent::TransitionRequested {
                    transporter_id: transporter_id.to_string(),
                    service_id,
                });
                true
            }
            Err(err) => {
                warn!(transporter_id, service_id = %service_id, error = %err, "in_transit request failed; not resent for this service");
                self.alert(transporter_id, &err);
                false
            }
        }
    }

    async fn completion_rejected(&self, transporter_id: &str) -> bool {
        let Some(session) = self.state.session(transporter_id) else {
            return false;
        };
        self.failed_completions
            .lock()
            .await
            .get(transporter_id)
            .is_some_and(|service_id| *service_id == session.service.service_id)
    }

    /// Drops per-service guards once the backend reports a different service.
    async fn forget_other_service(&self, transporter_id: &str, service_id: &str) {
        {
            let mut transitions = self.transitions.lock().await;
            if transitions
                .get(transporter_id)
                .is_some_and(|issued| issued.service_id != service_id)
            {
                transitions.remove(transporter_id);
            }
        }
        let mut failed = self.failed_completions.lock().await;
        if failed
            .get(transporter_id)
            .is_some_and(|failed_id| failed_id != service_id)
        {
            failed.remove(transporter_id);
        }
    }

    async fn ensure_device_location(&self) {
        if self.state.device_location().await.is_some() {
            return;
        }
        if self.permission_requested.swap(true, Ordering::SeqCst) {
            return;
        }

        self.state.emit(SessionEvent::LocationPermissionRequested);
        match self.location.request_permission().await {
            PermissionStatus::Granted => match self.location.current_position().await {
                Ok(point) => {
                    info!(lat = point.lat, lng = point.lng, "device location acquired");
                    self.state.set_device_location(point).await;
                }
                Err(err) => warn!(error = %err, "unable to get device location"),
            },
            PermissionStatus::Denied => {
                let err = AppError::PermissionDenied(
                    "location access is required to show the map".to_string(),
                );
                warn!(error = %err, "location permission denied");
                self.state.emit(SessionEvent::PermissionDenied {
                    message: err.alert_message(),
                });
            }
        }
    }

    fn alert(&self, transporter_id: &str, err: &AppError) {
        self.state.emit(SessionEvent::Alert {
            transporter_id: transporter_id.to_string(),
            message: err.alert_message(),
        });
    }
}

fn found_or_none(
    leg: &str,
    transporter_id: &str,
    result: Result<Option<ActiveRoute>, AppError>,
) -> Option<ActiveRoute> {
    match result {
        Ok(route) => route,
        Err(err) => {
            warn!(leg, transporter_id, error = %err, "route lookup failed; treating as not found");
            None
        }
    }
}

fn booking_update(
    session: &DeliverySession,
    booking: &Booking,
    status: BookingStatus,
) -> Result<BookingStatusUpdate, AppError> {
    let party = booking
        .party_for(session.mode == SessionMode::InTransit)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "booking {} names neither farmer nor buyer",
                booking.booking_id
            ))
        })?;

    let (farmers_user_id, buyers_user_id) = match party {
        BookingParty::Farmer(id) => (Some(id), None),
        BookingParty::Buyer(id) => (None, Some(id)),
    };

    Ok(BookingStatusUpdate {
        service_id: session.service.service_id.clone(),
        farmers_user_id,
        buyers_user_id,
        status,
    })
}

fn state_label(state: ControllerState) -> &'static str {
    match state {
        ControllerState::NoSession => "none",
        ControllerState::Picking => "picking",
        ControllerState::InTransit => "in_transit",
        ControllerState::TransitioningToInTransit => "transitioning",
        ControllerState::Completed => "completed",
    }
}
