use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Rejected,
    Picking,
    #[serde(alias = "inTransit")]
    InTransit,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Rejected => "rejected",
            BookingStatus::Picking => "picking",
            BookingStatus::InTransit => "in_transit",
            BookingStatus::Completed => "completed",
        }
    }
}

/// Which side of a booking a status update is reported for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingParty {
    Farmer(String),
    Buyer(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub booking_id: String,
    #[serde(default, alias = "farmers_user_id")]
    pub farmer_user_id: Option<String>,
    #[serde(default, alias = "buyers_user_id")]
    pub buyer_user_id: Option<String>,
    pub status: BookingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
}

impl Booking {
    pub fn is_completed(&self) -> bool {
        self.status == BookingStatus::Completed
    }

    /// Farmer side while collecting, buyer side while delivering. Falls back
    /// to whichever party the booking actually names.
    pub fn party_for(&self, delivering: bool) -> Option<BookingParty> {
        let farmer = self.farmer_user_id.clone().map(BookingParty::Farmer);
        let buyer = self.buyer_user_id.clone().map(BookingParty::Buyer);

        if delivering {
            buyer.or(farmer)
        } else {
            farmer.or(buyer)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Booking, BookingParty, BookingStatus};
    use serde_json::json;

    #[test]
    fn parses_backend_booking_shape() {
        let booking: Booking = serde_json::from_value(json!({
            "booking_id": "bk-1",
            "farmers_user_id": "f-1",
            "buyers_user_id": "b-1",
            "status": "inTransit",
            "distance_km": 12.5
        }))
        .unwrap();

        assert_eq!(booking.status, BookingStatus::InTransit);
        assert_eq!(booking.farmer_user_id.as_deref(), Some("f-1"));
        assert_eq!(booking.distance_km, Some(12.5));
    }

    #[test]
    fn party_follows_delivery_leg() {
        let booking = Booking {
            booking_id: "bk-1".to_string(),
            farmer_user_id: Some("f-1".to_string()),
            buyer_user_id: Some("b-1".to_string()),
            status: BookingStatus::Accepted,
            address: None,
            phone: None,
            distance_km: None,
            total_price: None,
        };

        assert_eq!(
            booking.party_for(false),
            Some(BookingParty::Farmer("f-1".to_string()))
        );
        assert_eq!(
            booking.party_for(true),
            Some(BookingParty::Buyer("b-1".to_string()))
        );

        let farmer_only = Booking {
            buyer_user_id: None,
            ..booking
        };
        assert_eq!(
            farmer_only.party_for(true),
            Some(BookingParty::Farmer("f-1".to_string()))
        );
    }
}
