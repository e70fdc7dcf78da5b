use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::controller::RouteSessionController;
use crate::models::session::ControllerState;

/// Reconciles the signed-in transporter on a fixed interval.
pub async fn run_poll_loop(controller: Arc<RouteSessionController>, every: Duration) {
    info!(interval_ms = every.as_millis() as u64, "route poller started");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        poll_once(&controller).await;
    }
}

/// Runs one poll cycle. Returns `None` without touching the backend while
/// the booking overlay is open or no transporter is signed in.
pub async fn poll_once(controller: &RouteSessionController) -> Option<ControllerState> {
    if controller.state().overlay_open() {
        debug!("overlay open; poll suspended");
        return None;
    }

    let transporter_id = controller.state().transporter_id().await?;

    let state = controller.tick(&transporter_id).await;
    debug!(transporter_id = %transporter_id, ?state, "poll complete");
    Some(state)
}

#[cfg(test)]
mod tests {
    use super::poll_once;
    use crate::engine::testing::{booking, controller, route, FakeRoutes, Lookup};
    use crate::models::booking::BookingStatus;
    use crate::models::session::ControllerState;
    use crate::state::Selection;

    fn picking_routes() -> std::sync::Arc<FakeRoutes> {
        FakeRoutes::new(
            Lookup::Found(route("svc-1", vec![booking("b1", BookingStatus::Pending)])),
            Lookup::NotFound,
        )
    }

    #[tokio::test]
    async fn skips_when_nobody_signed_in() {
        let routes = picking_routes();
        let (controller, _rx) = controller(routes.clone());

        assert_eq!(poll_once(&controller).await, None);
        assert_eq!(routes.lookups(), 0);
    }

    #[tokio::test]
    async fn skips_while_overlay_open() {
        let routes = picking_routes();
        let (controller, _rx) = controller(routes.clone());
        controller
            .state()
            .set_transporter_id(Some("t-1".to_string()))
            .await;
        controller
            .state()
            .select(Selection {
                transporter_id: "t-1".to_string(),
                booking_id: "b1".to_string(),
            })
            .await;

        assert_eq!(poll_once(&controller).await, None);
        assert_eq!(routes.lookups(), 0);

        controller.close_overlay().await;
        assert_eq!(poll_once(&controller).await, Some(ControllerState::Picking));
        assert_eq!(routes.lookups(), 2);
    }

    #[tokio::test]
    async fn polls_signed_in_transporter() {
        let routes = picking_routes();
        let (controller, _rx) = controller(routes.clone());
        controller
            .state()
            .set_transporter_id(Some("t-1".to_string()))
            .await;

        assert_eq!(poll_once(&controller).await, Some(ControllerState::Picking));
        assert_eq!(poll_once(&controller).await, Some(ControllerState::Picking));
        assert_eq!(routes.lookups(), 4);
        assert_eq!(
            controller.state().session("t-1").unwrap().service.service_id,
            "svc-1"
        );
    }
}
