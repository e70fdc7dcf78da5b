use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_REGION_DELTA: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoRegion {
    pub center: GeoPoint,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl GeoRegion {
    pub fn around(center: GeoPoint) -> Self {
        Self {
            center,
            latitude_delta: DEFAULT_REGION_DELTA,
            longitude_delta: DEFAULT_REGION_DELTA,
        }
    }
}

/// A farmer or buyer stop as reported by the route info endpoints.
///
/// Coordinates arrive either as numbers or as numeric strings, under
/// `latitude`/`longitude` or `lat`/`lng`. Unparseable values become `None`
/// and the stop is left off the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopLocation {
    #[serde(
        default,
        alias = "farmers_user_id",
        alias = "buyers_user_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(default, alias = "latitude", deserialize_with = "lenient_coordinate")]
    pub lat: Option<f64>,
    #[serde(default, alias = "longitude", deserialize_with = "lenient_coordinate")]
    pub lng: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl StopLocation {
    pub fn point(&self) -> Option<GeoPoint> {
        let point = GeoPoint {
            lat: self.lat?,
            lng: self.lng?,
        };
        point.is_valid().then_some(point)
    }
}

fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(value)) => Some(value),
        Some(Raw::Text(text)) => text.trim().parse::<f64>().ok(),
        Some(Raw::Other(_)) | None => None,
    })
}
