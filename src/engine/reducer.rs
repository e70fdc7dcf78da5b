use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::events::{PushEvent, SessionEvent};
use crate::geo::build_map_view;
use crate::models::geo::GeoPoint;
use crate::models::service::{ActiveRoute, ServiceStatus};
use crate::models::session::{ControllerState, DeliverySession, SessionMode};

/// Per-transporter session store entry.
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    pub session: Option<DeliverySession>,
    /// Highest input sequence applied to this slot.
    pub last_seq: u64,
    announced_empty: bool,
}

#[derive(Debug, Clone)]
pub struct PollResult {
    pub state: ControllerState,
    pub route: Option<ActiveRoute>,
}

#[derive(Debug, Clone)]
pub enum SessionInput {
    Poll(PollResult),
    Push(PushEvent),
}

pub struct ReduceContext<'a> {
    pub transporter_id: &'a str,
    pub seq: u64,
    pub device: Option<GeoPoint>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Reduction {
    pub applied: bool,
    pub events: Vec<SessionEvent>,
}

impl Reduction {
    fn skipped() -> Self {
        Self::default()
    }
}

fn rank(state: ControllerState) -> u8 {
    match state {
        ControllerState::NoSession => 0,
        ControllerState::Picking => 1,
        ControllerState::TransitioningToInTransit => 2,
        ControllerState::InTransit => 3,
        ControllerState::Completed => 4,
    }
}

/// Applies one input. Polls older than the newest applied input are
/// dropped, and within one service the state never moves backwards.
pub fn reduce(slot: &mut SessionSlot, input: SessionInput, ctx: &ReduceContext<'_>) -> Reduction {
    match input {
        SessionInput::Poll(poll) => reduce_poll(slot, poll, ctx),
        SessionInput::Push(push) => reduce_push(slot, push, ctx),
    }
}

fn reduce_poll(slot: &mut SessionSlot, poll: PollResult, ctx: &ReduceContext<'_>) -> Reduction {
    if ctx.seq <= slot.last_seq {
        return Reduction::skipped();
    }

    let route = match (poll.state, poll.route) {
        (ControllerState::NoSession, _) | (_, None) => {
            slot.last_seq = ctx.seq;
            return clear_session(slot, ctx);
        }
        (_, Some(route)) => route,
    };

    let previous = slot.session.as_ref();
    let same_service = previous
        .map(|s| s.service.service_id == route.service.service_id)
        .unwrap_or(false);

    if same_service {
        if let Some(current) = previous {
            if rank(poll.state) < rank(current.state) {
                return Reduction::skipped();
            }
        }
    }

    let mode = poll.state.mode();
    let map = build_map_view(mode, &route.service, ctx.device);
    let mut events = Vec::new();

    let previous_mode = previous.map(|s| s.mode).unwrap_or(SessionMode::None);
    if !same_service || previous_mode != mode {
        events.push(SessionEvent::ModeChanged {
            transporter_id: ctx.transporter_id.to_string(),
            from: previous_mode,
            to: mode,
            state: poll.state,
        });
    }

    let markers_changed = previous.map(|s| s.map.markers != map.markers).unwrap_or(true);
    if markers_changed {
        events.push(SessionEvent::MarkersUpdated {
            transporter_id: ctx.transporter_id.to_string(),
            markers: map.markers.len(),
        });
    }

    let session_id = match previous {
        Some(current) if same_service => current.session_id,
        _ => Uuid::new_v4(),
    };

    slot.session = Some(DeliverySession {
        session_id,
        transporter_id: ctx.transporter_id.to_string(),
        mode,
        state: poll.state,
        region: map.region,
        service: route.service,
        bookings: route.bookings,
        map,
        poll_seq: ctx.seq,
        updated_at: ctx.now,
    });
    slot.last_seq = ctx.seq;
    slot.announced_empty = false;

    Reduction {
        applied: true,
        events,
    }
}

fn clear_session(slot: &mut SessionSlot, ctx: &ReduceContext<'_>) -> Reduction {
    let mut events = Vec::new();

    if let Some(previous) = slot.session.take() {
        events.push(SessionEvent::ModeChanged {
            transporter_id: ctx.transporter_id.to_string(),
            from: previous.mode,
            to: SessionMode::None,
            state: ControllerState::NoSession,
        });
    }

    if !slot.announced_empty {
        events.push(SessionEvent::NoActiveSession {
            transporter_id: ctx.transporter_id.to_string(),
        });
        slot.announced_empty = true;
    }

    Reduction {
        applied: true,
        events,
    }
}

fn reduce_push(slot: &mut SessionSlot, push: PushEvent, ctx: &ReduceContext<'_>) -> Reduction {
    let Some(session) = slot.session.as_mut() else {
        return Reduction::skipped();
    };

    let mut events = Vec::new();

    match push {
        PushEvent::BookingStatusChanged { booking_id, status } => {
            let Some(booking) = session
                .bookings
                .iter_mut()
                .find(|b| b.booking_id == booking_id)
            else {
                return Reduction::skipped();
            };

            booking.status = status;
            events.push(SessionEvent::BookingUpdated {
                transporter_id: ctx.transporter_id.to_string(),
                booking_id,
                status,
            });
        }
        PushEvent::ServiceStatusChanged { service_id, status } => {
            if session.service.service_id != service_id {
                return Reduction::skipped();
            }

            session.service.status = status;
            let next_state = match status {
                ServiceStatus::Completed => Some(ControllerState::Completed),
                ServiceStatus::InTransit | ServiceStatus::Dropping => {
                    Some(ControllerState::InTransit)
                }
                _ => None,
            };

            if let Some(next) = next_state.filter(|next| rank(*next) > rank(session.state)) {
                let from = session.mode;
                session.state = next;
                session.mode = next.mode();

                if from != session.mode {
                    session.map = build_map_view(session.mode, &session.service, ctx.device);
                    session.region = session.map.region;
                    events.push(SessionEvent::ModeChanged {
                        transporter_id: ctx.transporter_id.to_string(),
                        from,
                        to: session.mode,
                        state: next,
                    });
                }

                if next == ControllerState::Completed {
                    events.push(SessionEvent::SessionCompleted {
                        transporter_id: ctx.transporter_id.to_string(),
                        service_id,
                    });
                }
            }
        }
    }

    session.updated_at = ctx.now;
    slot.last_seq = slot.last_seq.max(ctx.seq);

    Reduction {
        applied: true,
        events,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{reduce, PollResult, ReduceContext, SessionInput, SessionSlot};
    use crate::engine::events::{PushEvent, SessionEvent};
    use crate::models::booking::{Booking, BookingStatus};
    use crate::models::geo::StopLocation;
    use crate::models::service::{ActiveRoute, ServiceRecord, ServiceStatus};
    use crate::models::session::{ControllerState, SessionMode};

    fn route(service_id: &str) -> ActiveRoute {
        ActiveRoute {
            service: ServiceRecord {
                service_id: service_id.to_string(),
                vehicle_plate: Some("KDA 123X".to_string()),
                farmer_locations: vec![StopLocation {
                    user_id: Some("f-1".to_string()),
                    lat: Some(-1.29),
                    lng: Some(36.82),
                    address: None,
                }],
                buyer_locations: Vec::new(),
                status: ServiceStatus::Picking,
            },
            bookings: vec![Booking {
                booking_id: "bk-1".to_string(),
                farmer_user_id: Some("f-1".to_string()),
                buyer_user_id: Some("b-1".to_string()),
                status: BookingStatus::Pending,
                address: None,
                phone: None,
                distance_km: None,
                total_price: None,
            }],
        }
    }

    fn ctx(seq: u64) -> ReduceContext<'static> {
        ReduceContext {
            transporter_id: "t-1",
            seq,
            device: None,
            now: Utc::now(),
        }
    }

    fn poll(state: ControllerState, route: Option<ActiveRoute>) -> SessionInput {
        SessionInput::Poll(PollResult { state, route })
    }

    #[test]
    fn first_poll_creates_session_and_announces_mode() {
        let mut slot = SessionSlot::default();
        let out = reduce(&mut slot, poll(ControllerState::Picking, Some(route("svc-1"))), &ctx(1));

        assert!(out.applied);
        let session = slot.session.as_ref().unwrap();
        assert_eq!(session.mode, SessionMode::Picking);
        assert_eq!(session.bookings.len(), 1);
        assert!(matches!(
            out.events[0],
            SessionEvent::ModeChanged { to: SessionMode::Picking, .. }
        ));
    }

    #[test]
    fn stale_poll_is_dropped() {
        let mut slot = SessionSlot::default();
        reduce(&mut slot, poll(ControllerState::InTransit, Some(route("svc-1"))), &ctx(5));
        let out = reduce(&mut slot, poll(ControllerState::NoSession, None), &ctx(4));

        assert!(!out.applied);
        assert_eq!(slot.session.unwrap().mode, SessionMode::InTransit);
    }

    #[test]
    fn mode_never_regresses_within_a_service() {
        let mut slot = SessionSlot::default();
        reduce(&mut slot, poll(ControllerState::InTransit, Some(route("svc-1"))), &ctx(1));
        let out = reduce(&mut slot, poll(ControllerState::Picking, Some(route("svc-1"))), &ctx(2));

        assert!(!out.applied);
        assert_eq!(slot.session.unwrap().state, ControllerState::InTransit);
    }

    #[test]
    fn new_service_replaces_session() {
        let mut slot = SessionSlot::default();
        reduce(&mut slot, poll(ControllerState::InTransit, Some(route("svc-1"))), &ctx(1));
        let first_id = slot.session.as_ref().unwrap().session_id;
        reduce(&mut slot, poll(ControllerState::Picking, Some(route("svc-2"))), &ctx(2));

        let session = slot.session.unwrap();
        assert_eq!(session.service.service_id, "svc-2");
        assert_ne!(session.session_id, first_id);
    }

    #[test]
    fn empty_state_is_announced_once() {
        let mut slot = SessionSlot::default();
        let first = reduce(&mut slot, poll(ControllerState::NoSession, None), &ctx(1));
        let second = reduce(&mut slot, poll(ControllerState::NoSession, None), &ctx(2));

        assert_eq!(
            first.events,
            vec![SessionEvent::NoActiveSession {
                transporter_id: "t-1".to_string()
            }]
        );
        assert!(second.events.is_empty());
    }

    #[test]
    fn push_updates_booking_and_fences_older_polls() {
        let mut slot = SessionSlot::default();
        reduce(&mut slot, poll(ControllerState::Picking, Some(route("svc-1"))), &ctx(1));

        let push = SessionInput::Push(PushEvent::BookingStatusChanged {
            booking_id: "bk-1".to_string(),
            status: BookingStatus::Completed,
        });
        assert!(reduce(&mut slot, push, &ctx(3)).applied);

        let late = reduce(&mut slot, poll(ControllerState::Picking, Some(route("svc-1"))), &ctx(2));
        assert!(!late.applied);
        assert!(slot.session.unwrap().all_bookings_completed());
    }

    #[test]
    fn completed_push_marks_session_completed() {
        let mut slot = SessionSlot::default();
        reduce(&mut slot, poll(ControllerState::InTransit, Some(route("svc-1"))), &ctx(1));

        let push = SessionInput::Push(PushEvent::ServiceStatusChanged {
            service_id: "svc-1".to_string(),
            status: ServiceStatus::Completed,
        });
        let out = reduce(&mut slot, push, &ctx(2));

        assert!(out.events.contains(&SessionEvent::SessionCompleted {
            transporter_id: "t-1".to_string(),
            service_id: "svc-1".to_string(),
        }));
        assert_eq!(slot.session.unwrap().state, ControllerState::Completed);
    }

    #[test]
    fn push_without_session_is_ignored() {
        let mut slot = SessionSlot::default();
        let push = SessionInput::Push(PushEvent::BookingStatusChanged {
            booking_id: "bk-1".to_string(),
            status: BookingStatus::Completed,
        });
        assert!(!reduce(&mut slot, push, &ctx(1)).applied);
    }
}
