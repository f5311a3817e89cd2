use aircraft_risk::{
    AccidentRecord, AircraftRecord, DirectiveRecord, LivePosition, RiskAssessment,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// ===== Aircraft Summary =====
#[derive(Debug, Serialize)]
pub struct AircraftSummary {
    pub aircraft: AircraftRecord,
    pub accidents: Vec<AccidentRecord>,
    pub directives: Vec<DirectiveRecord>,
    pub risk: RiskAssessment,
}

// ===== Live Position Update =====
#[derive(Debug, Deserialize, Validate)]
pub struct PositionUpdateRequest {
    #[validate(length(min = 1, max = 10))]
    pub tail_number: String,
    #[validate(length(equal = 6))]
    pub icao24: String,
    #[validate(length(max = 8))]
    pub callsign: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
    pub altitude_ft: Option<f64>,
    #[validate(range(min = 0.0))]
    pub ground_speed_kt: Option<f64>,
    #[validate(range(min = 0.0, max = 360.0))]
    pub heading_deg: Option<f64>,
    #[serde(default)]
    pub on_ground: bool,
    #[serde(default)]
    pub observed_at: Option<DateTime<Utc>>,
}

impl From<PositionUpdateRequest> for LivePosition {
    fn from(req: PositionUpdateRequest) -> Self {
        LivePosition {
            tail_number: req.tail_number,
            icao24: req.icao24.to_ascii_lowercase(),
            callsign: req.callsign.map(|c| c.trim().to_ascii_uppercase()),
            latitude: req.latitude,
            longitude: req.longitude,
            altitude_ft: req.altitude_ft,
            ground_speed_kt: req.ground_speed_kt,
            heading_deg: req.heading_deg,
            on_ground: req.on_ground,
            observed_at: req.observed_at.unwrap_or_else(Utc::now),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PositionAck {
    pub status: String,
    pub tail_number: String,
    pub observed_at: DateTime<Utc>,
}

// ===== Health Check =====
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> PositionUpdateRequest {
        PositionUpdateRequest {
            tail_number: "N123AB".to_string(),
            icao24: "A1B2C3".to_string(),
            callsign: Some(" ual123 ".to_string()),
            latitude: 37.62,
            longitude: -122.38,
            altitude_ft: Some(12000.0),
            ground_speed_kt: Some(250.0),
            heading_deg: Some(280.0),
            on_ground: false,
            observed_at: None,
        }
    }

    #[test]
    fn test_valid_position_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_out_of_range_latitude() {
        let mut req = request();
        req.latitude = -91.0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_bad_icao_length() {
        let mut req = request();
        req.icao24 = "ABC".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_conversion_normalises_fields() {
        let position = LivePosition::from(request());
        assert_eq!(position.icao24, "a1b2c3");
        assert_eq!(position.callsign.as_deref(), Some("UAL123"));
    }
}
