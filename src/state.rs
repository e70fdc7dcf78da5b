use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use crate::engine::events::SessionEvent;
use crate::engine::reducer::{reduce, Reduction, ReduceContext, SessionInput, SessionSlot};
use crate::models::geo::GeoPoint;
use crate::models::session::{DeliverySession, SessionMode};
use crate::observability::metrics::Metrics;

/// Booking the transporter has opened in the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub transporter_id: String,
    pub booking_id: String,
}

/// Application-state store shared by the controller, the poll loop and the
/// local API.
pub struct AppState {
    pub sessions: DashMap<String, SessionSlot>,
    pub events_tx: broadcast::Sender<SessionEvent>,
    pub metrics: Metrics,
    transporter_id: RwLock<Option<String>>,
    device_location: RwLock<Option<GeoPoint>>,
    selection: RwLock<Option<Selection>>,
    overlay_open: AtomicBool,
    seq: AtomicU64,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        let (events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            sessions: DashMap::new(),
            events_tx,
            metrics: Metrics::new(),
            transporter_id: RwLock::new(None),
            device_location: RwLock::new(None),
            selection: RwLock::new(None),
            overlay_open: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }
    }

    /// Sequence number for the next input; taken when a poll is issued, not
    /// when it lands.
    pub fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn emit(&self, event: SessionEvent) {
        debug!(?event, "session event");
        let _ = self.events_tx.send(event);
    }

    pub async fn apply(&self, transporter_id: &str, seq: u64, input: SessionInput) -> Reduction {
        let device = self.device_location().await;
        let reduction = {
            let mut slot = self.sessions.entry(transporter_id.to_string()).or_default();
            let ctx = ReduceContext {
                transporter_id,
                seq,
                device,
                now: Utc::now(),
            };
            reduce(&mut slot, input, &ctx)
        };

        if reduction.applied {
            self.metrics.active_sessions.set(self.active_session_count() as i64);
        }
        for event in &reduction.events {
            self.emit(event.clone());
        }

        reduction
    }

    pub fn session(&self, transporter_id: &str) -> Option<DeliverySession> {
        self.sessions
            .get(transporter_id)
            .and_then(|slot| slot.session.clone())
    }

    /// Events describing the signed-in transporter's current session, for
    /// subscribers that connect after it was announced.
    pub async fn snapshot_events(&self) -> Vec<SessionEvent> {
        let Some(transporter_id) = self.transporter_id().await else {
            return Vec::new();
        };

        match self.session(&transporter_id) {
            Some(session) => vec![SessionEvent::ModeChanged {
                transporter_id,
                from: SessionMode::None,
                to: session.mode,
                state: session.state,
            }],
            None => vec![SessionEvent::NoActiveSession { transporter_id }],
        }
    }

    pub fn active_session_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().session.is_some())
            .count()
    }

    pub async fn transporter_id(&self) -> Option<String> {
        self.transporter_id.read().await.clone()
    }

    pub async fn set_transporter_id(&self, transporter_id: Option<String>) {
        *self.transporter_id.write().await = transporter_id;
    }

    pub async fn device_location(&self) -> Option<GeoPoint> {
        *self.device_location.read().await
    }

    pub async fn set_device_location(&self, point: GeoPoint) {
        *self.device_location.write().await = Some(point);
    }

    pub async fn selection(&self) -> Option<Selection> {
        self.selection.read().await.clone()
    }

    pub async fn select(&self, selection: Selection) {
        *self.selection.write().await = Some(selection);
        self.overlay_open.store(true, Ordering::SeqCst);
    }

    /// Clears the selected booking and closes the overlay.
    pub async fn close_overlay(&self) {
        *self.selection.write().await = None;
        self.overlay_open.store(false, Ordering::SeqCst);
    }

    pub fn overlay_open(&self) -> bool {
        self.overlay_open.load(Ordering::SeqCst)
    }
}
