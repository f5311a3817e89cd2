//! Core types for aircraft records and risk scores

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest registration accepted (ICAO marks plus hyphen)
const MAX_TAIL_LEN: usize = 10;

/// Normalise a tail number: trim whitespace and upper-case it.
///
/// Registrations are ASCII letters, digits and hyphens ("N123AB", "G-ABCD").
pub fn normalize_tail(raw: &str) -> Result<String> {
    let tail = raw.trim().to_ascii_uppercase();

    if tail.is_empty() {
        return Err(Error::InvalidTailNumber("tail number is empty".to_string()));
    }

    if tail.len() > MAX_TAIL_LEN {
        return Err(Error::InvalidTailNumber(format!(
            "{} exceeds {} characters",
            tail, MAX_TAIL_LEN
        )));
    }

    if !tail.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(Error::InvalidTailNumber(format!(
            "{} contains invalid characters",
            tail
        )));
    }

    Ok(tail)
}

/// Registered aircraft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftRecord {
    /// Registration mark, e.g. "N123AB"
    pub tail_number: String,

    /// Manufacturer
    pub make: String,

    /// Model designation
    pub model: String,

    /// Year of manufacture, when known
    pub year: Option<i32>,

    /// Manufacturer serial number
    #[serde(default)]
    pub serial_number: Option<String>,

    /// Registered owner name
    #[serde(default)]
    pub owner_name: Option<String>,

    /// Number of owners on record
    #[serde(default)]
    pub owner_count: Option<u32>,
}

impl AircraftRecord {
    /// Minimal record with identification only
    pub fn new(tail_number: &str, make: &str, model: &str, year: Option<i32>) -> Self {
        Self {
            tail_number: tail_number.to_string(),
            make: make.to_string(),
            model: model.to_string(),
            year,
            serial_number: None,
            owner_name: None,
            owner_count: None,
        }
    }

    /// Age in whole years relative to `current_year`
    pub fn age(&self, current_year: i32) -> Option<i32> {
        self.year.map(|year| current_year.saturating_sub(year))
    }
}

/// Accident or incident report for one aircraft
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccidentRecord {
    /// Tail number of the aircraft involved
    pub tail_number: String,

    /// Date of the event
    #[serde(default)]
    pub event_date: Option<NaiveDate>,

    /// Fatalities; absent is treated as zero
    #[serde(default)]
    pub fatalities: Option<u32>,

    /// Short narrative
    #[serde(default)]
    pub summary: Option<String>,
}

impl AccidentRecord {
    /// Accident with the given fatality count
    pub fn new(tail_number: &str, fatalities: Option<u32>) -> Self {
        Self {
            tail_number: tail_number.to_string(),
            event_date: None,
            fatalities,
            summary: None,
        }
    }

    /// True when at least one fatality was recorded
    pub fn is_fatal(&self) -> bool {
        self.fatalities.unwrap_or(0) > 0
    }
}

/// Airworthiness directive status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectiveStatus {
    /// Still requires compliance action
    Open,
    /// Complied with or superseded
    Closed,
    /// Any other status reported by the source. The source text is not
    /// kept; it serializes back as "OTHER".
    #[serde(other)]
    Other,
}

impl DirectiveStatus {
    /// Status as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            DirectiveStatus::Open => "OPEN",
            DirectiveStatus::Closed => "CLOSED",
            DirectiveStatus::Other => "OTHER",
        }
    }
}

impl From<&str> for DirectiveStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "OPEN" => DirectiveStatus::Open,
            "CLOSED" => DirectiveStatus::Closed,
            _ => DirectiveStatus::Other,
        }
    }
}

impl fmt::Display for DirectiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Airworthiness directive applicable to a make/model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectiveRecord {
    /// AD number, e.g. "2020-12-05"
    pub ad_number: String,

    /// Manufacturer the directive applies to
    pub make: String,

    /// Model the directive applies to
    pub model: String,

    /// Subject line
    #[serde(default)]
    pub subject: Option<String>,

    /// Compliance status
    pub status: DirectiveStatus,

    /// Effective date
    #[serde(default)]
    pub effective_date: Option<NaiveDate>,
}

impl DirectiveRecord {
    /// Directive with the given status
    pub fn new(ad_number: &str, make: &str, model: &str, status: DirectiveStatus) -> Self {
        Self {
            ad_number: ad_number.to_string(),
            make: make.to_string(),
            model: model.to_string(),
            subject: None,
            status,
            effective_date: None,
        }
    }

    /// True when compliance action is still outstanding
    pub fn is_open(&self) -> bool {
        self.status == DirectiveStatus::Open
    }
}

/// Lookup key for directives: upper-cased "MAKE|MODEL"
pub fn directive_key(make: &str, model: &str) -> String {
    format!(
        "{}|{}",
        make.trim().to_ascii_uppercase(),
        model.trim().to_ascii_uppercase()
    )
}

/// Latest observed position of an aircraft
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePosition {
    /// Tail number
    pub tail_number: String,

    /// ICAO 24-bit transponder address, hex
    pub icao24: String,

    /// Flight callsign
    #[serde(default)]
    pub callsign: Option<String>,

    /// Latitude in decimal degrees
    pub latitude: f64,

    /// Longitude in decimal degrees
    pub longitude: f64,

    /// Altitude in feet
    #[serde(default)]
    pub altitude_ft: Option<f64>,

    /// Ground speed in knots
    #[serde(default)]
    pub ground_speed_kt: Option<f64>,

    /// Track in degrees clockwise from north
    #[serde(default)]
    pub heading_deg: Option<f64>,

    /// On the ground
    #[serde(default)]
    pub on_ground: bool,

    /// Observation time
    pub observed_at: DateTime<Utc>,
}

impl LivePosition {
    /// Check coordinate ranges and normalise the tail number in place
    pub fn validate(&mut self) -> Result<()> {
        self.tail_number = normalize_tail(&self.tail_number)?;

        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(Error::InvalidPosition(format!(
                "latitude {} out of range",
                self.latitude
            )));
        }

        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(Error::InvalidPosition(format!(
                "longitude {} out of range",
                self.longitude
            )));
        }

        if let Some(heading) = self.heading_deg {
            if !(0.0..=360.0).contains(&heading) {
                return Err(Error::InvalidPosition(format!(
                    "heading {} out of range",
                    heading
                )));
            }
        }

        Ok(())
    }
}

/// Risk score (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RiskScore(u8);

impl RiskScore {
    /// Create new risk score (0-100)
    pub fn new(score: u8) -> Self {
        Self(score.min(100))
    }

    /// Clamp an unbounded point total into a score
    pub fn from_points(points: u32) -> Self {
        Self(points.min(100) as u8)
    }

    /// Get raw score
    pub fn score(&self) -> u8 {
        self.0
    }

    /// Check if high risk (>= 75)
    pub fn is_high_risk(&self) -> bool {
        self.0 >= 75
    }

    /// Check if medium risk (50-74)
    pub fn is_medium_risk(&self) -> bool {
        (50..75).contains(&self.0)
    }

    /// Check if low risk (< 50)
    pub fn is_low_risk(&self) -> bool {
        self.0 < 50
    }
}

/// Risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Low risk
    Low,
    /// Medium risk
    Medium,
    /// High risk
    High,
}

impl From<RiskScore> for RiskLevel {
    fn from(score: RiskScore) -> Self {
        if score.is_high_risk() {
            RiskLevel::High
        } else if score.is_medium_risk() {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// One contribution to a risk score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactor {
    /// Factor name
    pub name: String,

    /// Points added before clamping
    pub points: u32,

    /// Human-readable reason
    pub reason: String,
}

/// Risk assessment result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Clamped score
    pub risk_score: RiskScore,

    /// Risk level
    pub risk_level: RiskLevel,

    /// Formula that produced the score
    pub formula: crate::scoring::RiskFormula,

    /// Contributions in evaluation order
    pub factors: Vec<RiskFactor>,

    /// Directives still open
    pub open_directives: usize,

    /// Assessment timestamp
    pub assessed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_tail() {
        assert_eq!(normalize_tail("  n123ab ").unwrap(), "N123AB");
        assert_eq!(normalize_tail("g-abcd").unwrap(), "G-ABCD");
        assert!(normalize_tail("   ").is_err());
        assert!(normalize_tail("N12/3").is_err());
        assert!(normalize_tail("N1234567890").is_err());
    }

    #[test]
    fn test_directive_status_parsing() {
        assert_eq!(DirectiveStatus::from("open"), DirectiveStatus::Open);
        assert_eq!(DirectiveStatus::from("CLOSED"), DirectiveStatus::Closed);
        assert_eq!(DirectiveStatus::from("SUPERSEDED"), DirectiveStatus::Other);

        let status: DirectiveStatus = serde_json::from_str("\"OPEN\"").unwrap();
        assert_eq!(status, DirectiveStatus::Open);
        let status: DirectiveStatus = serde_json::from_str("\"PENDING\"").unwrap();
        assert_eq!(status, DirectiveStatus::Other);
    }

    #[test]
    fn test_other_status_serializes_generically() {
        let status = DirectiveStatus::from("SUPERSEDED");
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"OTHER\"");
    }

    #[test]
    fn test_age_saturates() {
        let ancient = AircraftRecord::new("N1", "PIPER", "J-3", Some(i32::MIN));
        assert_eq!(ancient.age(2025), Some(i32::MAX));

        let unknown = AircraftRecord::new("N1", "PIPER", "J-3", None);
        assert_eq!(unknown.age(2025), None);
    }

    #[test]
    fn test_risk_score_clamping() {
        assert_eq!(RiskScore::new(150).score(), 100);
        assert_eq!(RiskScore::from_points(u32::MAX).score(), 100);
        assert_eq!(RiskScore::from_points(42).score(), 42);
    }

    #[test]
    fn test_risk_level() {
        assert_eq!(RiskLevel::from(RiskScore::new(25)), RiskLevel::Low);
        assert_eq!(RiskLevel::from(RiskScore::new(50)), RiskLevel::Medium);
        assert_eq!(RiskLevel::from(RiskScore::new(75)), RiskLevel::High);
    }

    #[test]
    fn test_position_validation() {
        let mut position = LivePosition {
            tail_number: " n123ab".to_string(),
            icao24: "a1b2c3".to_string(),
            callsign: None,
            latitude: 47.45,
            longitude: -122.31,
            altitude_ft: Some(3500.0),
            ground_speed_kt: Some(120.0),
            heading_deg: Some(180.0),
            on_ground: false,
            observed_at: Utc::now(),
        };
        assert!(position.validate().is_ok());
        assert_eq!(position.tail_number, "N123AB");

        position.latitude = 91.0;
        assert!(matches!(position.validate(), Err(Error::InvalidPosition(_))));
    }

    #[test]
    fn test_directive_key() {
        assert_eq!(directive_key(" cessna ", "172S"), "CESSNA|172S");
    }
}
