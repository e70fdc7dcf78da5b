use crate::models::geo::{DEFAULT_REGION_DELTA, GeoPoint, GeoRegion, StopLocation};
use crate::models::service::ServiceRecord;
use crate::models::session::{MapMarker, MapView, MarkerKind, SessionMode};

const EARTH_RADIUS_KM: f64 = 6_371.0;
const REGION_PADDING: f64 = 1.4;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Smallest region showing every point, padded and never tighter than the
/// default delta.
pub fn fit_region(points: &[GeoPoint]) -> Option<GeoRegion> {
    let first = points.first()?;
    let (mut min_lat, mut max_lat, mut min_lng, mut max_lng) =
        (first.lat, first.lat, first.lng, first.lng);

    for p in &points[1..] {
        min_lat = min_lat.min(p.lat);
        max_lat = max_lat.max(p.lat);
        min_lng = min_lng.min(p.lng);
        max_lng = max_lng.max(p.lng);
    }

    Some(GeoRegion {
        center: GeoPoint {
            lat: (min_lat + max_lat) / 2.0,
            lng: (min_lng + max_lng) / 2.0,
        },
        latitude_delta: ((max_lat - min_lat) * REGION_PADDING).max(DEFAULT_REGION_DELTA),
        longitude_delta: ((max_lng - min_lng) * REGION_PADDING).max(DEFAULT_REGION_DELTA),
    })
}

/// Greedy nearest-neighbour visiting order starting from `origin`.
pub fn order_nearest_first<T>(origin: GeoPoint, mut stops: Vec<(GeoPoint, T)>) -> Vec<(GeoPoint, T)> {
    let mut ordered = Vec::with_capacity(stops.len());
    let mut cursor = origin;

    while !stops.is_empty() {
        let next = stops
            .iter()
            .enumerate()
            .map(|(idx, (point, _))| (idx, haversine_km(&cursor, point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        let stop = stops.swap_remove(next);
        cursor = stop.0;
        ordered.push(stop);
    }

    ordered
}

pub fn route_length_km(route: &[GeoPoint]) -> f64 {
    route.windows(2).map(|w| haversine_km(&w[0], &w[1])).sum()
}

/// Markers, route and region for the current leg: farmer stops while
/// picking, buyer stops while in transit.
pub fn build_map_view(
    mode: SessionMode,
    service: &ServiceRecord,
    device: Option<GeoPoint>,
) -> MapView {
    let (kind, label, stops): (MarkerKind, &str, &[StopLocation]) = match mode {
        SessionMode::Picking => (MarkerKind::Farmer, "Farmer", service.farmer_locations.as_slice()),
        SessionMode::InTransit => (MarkerKind::Buyer, "Buyer", service.buyer_locations.as_slice()),
        SessionMode::None => return MapView::default(),
    };

    let located: Vec<(GeoPoint, &StopLocation)> = stops
        .iter()
        .filter_map(|stop| stop.point().map(|p| (p, stop)))
        .collect();

    let located = match device {
        Some(origin) => order_nearest_first(origin, located),
        None => located,
    };

    let mut markers: Vec<MapMarker> = located
        .iter()
        .map(|(point, stop)| MapMarker {
            kind,
            user_id: stop.user_id.clone(),
            point: *point,
            label: stop
                .address
                .clone()
                .unwrap_or_else(|| label.to_string()),
            distance_km: device.map(|d| haversine_km(&d, point)),
        })
        .collect();

    let route: Vec<GeoPoint> = located.iter().map(|(point, _)| *point).collect();

    let region = match device {
        Some(origin) => Some(GeoRegion::around(origin)),
        None => fit_region(&route),
    };

    if let Some(origin) = device {
        markers.push(MapMarker {
            kind: MarkerKind::Device,
            user_id: None,
            point: origin,
            label: "You".to_string(),
            distance_km: Some(0.0),
        });
    }

    MapView {
        region,
        markers,
        route_length_km: route_length_km(&route),
        route,
    }
}

#[cfg(test)]
mod tests {
    use super::{build_map_view, fit_region, haversine_km, order_nearest_first};
    use crate::models::geo::{GeoPoint, StopLocation};
    use crate::models::service::{ServiceRecord, ServiceStatus};
    use crate::models::session::{MarkerKind, SessionMode};

    fn stop(user: &str, lat: f64, lng: f64) -> StopLocation {
        StopLocation {
            user_id: Some(user.to_string()),
            lat: Some(lat),
            lng: Some(lng),
            address: None,
        }
    }

    fn service() -> ServiceRecord {
        ServiceRecord {
            service_id: "svc-1".to_string(),
            vehicle_plate: None,
            farmer_locations: vec![stop("far", -1.40, 36.90), stop("near", -1.29, 36.83)],
            buyer_locations: vec![stop("buyer", -1.10, 37.01)],
            status: ServiceStatus::Picking,
        }
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 53.5511,
            lng: 9.9937,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn single_point_region_uses_default_delta() {
        let region = fit_region(&[GeoPoint { lat: 1.0, lng: 2.0 }]).unwrap();
        assert_eq!(region.latitude_delta, 0.05);
        assert_eq!(region.longitude_delta, 0.05);
        assert!(fit_region(&[]).is_none());
    }

    #[test]
    fn nearest_stop_is_visited_first() {
        let origin = GeoPoint { lat: -1.28, lng: 36.82 };
        let ordered = order_nearest_first(
            origin,
            vec![
                (GeoPoint { lat: -1.40, lng: 36.90 }, "far"),
                (GeoPoint { lat: -1.29, lng: 36.83 }, "near"),
            ],
        );
        let names: Vec<&str> = ordered.iter().map(|(_, n)| *n).collect();
        assert_eq!(names, vec!["near", "far"]);
    }

    #[test]
    fn picking_map_shows_farmers_and_device() {
        let device = GeoPoint { lat: -1.28, lng: 36.82 };
        let view = build_map_view(SessionMode::Picking, &service(), Some(device));

        assert_eq!(view.markers.len(), 3);
        assert_eq!(view.markers[0].user_id.as_deref(), Some("near"));
        assert_eq!(view.markers[2].kind, MarkerKind::Device);
        assert_eq!(view.route.len(), 2);
        assert!(view.route_length_km > 0.0);
        assert_eq!(view.region.unwrap().center, device);
    }

    #[test]
    fn transit_map_without_device_fits_buyers() {
        let view = build_map_view(SessionMode::InTransit, &service(), None);

        assert_eq!(view.markers.len(), 1);
        assert_eq!(view.markers[0].kind, MarkerKind::Buyer);
        assert!(view.markers[0].distance_km.is_none());
        assert_eq!(view.route_length_km, 0.0);
        assert!(view.region.is_some());
    }

    #[test]
    fn no_session_has_empty_map() {
        let view = build_map_view(SessionMode::None, &service(), None);
        assert!(view.markers.is_empty());
        assert!(view.region.is_none());
    }
}
