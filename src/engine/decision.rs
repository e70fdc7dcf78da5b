use crate::models::service::ActiveRoute;

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Picking leg is emptied out and transit has nothing yet: move the
    /// service to `in_transit`.
    RequestInTransit(ActiveRoute),
    /// The move was already requested; wait for transit info to catch up.
    AwaitInTransit(ActiveRoute),
    Picking(ActiveRoute),
    InTransit(ActiveRoute),
    NoSession,
}

/// First matching rule wins. Failed lookups are passed in as `None`.
pub fn decide<F>(
    picking: Option<ActiveRoute>,
    transit: Option<ActiveRoute>,
    transition_issued: F,
) -> Decision
where
    F: Fn(&str) -> bool,
{
    match (picking, transit) {
        (Some(picking), None) if picking.bookings.is_empty() => {
            if transition_issued(&picking.service.service_id) {
                Decision::AwaitInTransit(picking)
            } else {
                Decision::RequestInTransit(picking)
            }
        }
        (Some(picking), _) if !picking.bookings.is_empty() => Decision::Picking(picking),
        (_, Some(transit)) => Decision::InTransit(transit),
        _ => Decision::NoSession,
    }
}
