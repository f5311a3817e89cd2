//! Aircraft data store.
//!
//! Handlers only see [`AircraftStore`]. Production runs against PostgreSQL
//! through [`PgStore`]; [`MemoryStore`] backs tests and database-less runs.

use aircraft_risk::{
    directive_key, AccidentRecord, AircraftRecord, DirectiveRecord, DirectiveStatus,
    LivePosition,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use std::time::Duration;

use crate::errors::ApiResult;
use crate::metrics::STORE_QUERIES_TOTAL;

#[async_trait]
pub trait AircraftStore: Send + Sync {
    async fn aircraft_by_tail(&self, tail: &str) -> ApiResult<Option<AircraftRecord>>;

    async fn accidents_for_tail(&self, tail: &str) -> ApiResult<Vec<AccidentRecord>>;

    /// Directives for a make/model, matched case-insensitively
    async fn directives_for_type(&self, make: &str, model: &str) -> ApiResult<Vec<DirectiveRecord>>;

    /// Insert or replace the latest position for the aircraft
    async fn upsert_position(&self, position: &LivePosition) -> ApiResult<()>;

    async fn health_check(&self) -> ApiResult<()>;
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await?;
    Ok(())
}

// ===== PostgreSQL =====

#[derive(Debug, FromRow)]
struct AircraftRow {
    tail_number: String,
    make: String,
    model: String,
    year: Option<i32>,
    serial_number: Option<String>,
    owner_name: Option<String>,
    owner_count: Option<i32>,
}

impl From<AircraftRow> for AircraftRecord {
    fn from(row: AircraftRow) -> Self {
        AircraftRecord {
            tail_number: row.tail_number,
            make: row.make,
            model: row.model,
            year: row.year,
            serial_number: row.serial_number,
            owner_name: row.owner_name,
            owner_count: row.owner_count.and_then(|c| u32::try_from(c).ok()),
        }
    }
}

#[derive(Debug, FromRow)]
struct AccidentRow {
    tail_number: String,
    event_date: Option<NaiveDate>,
    fatalities: Option<i32>,
    summary: Option<String>,
}

impl From<AccidentRow> for AccidentRecord {
    fn from(row: AccidentRow) -> Self {
        AccidentRecord {
            tail_number: row.tail_number,
            event_date: row.event_date,
            // Negative counts in source data are treated as unknown
            fatalities: row.fatalities.and_then(|f| u32::try_from(f).ok()),
            summary: row.summary,
        }
    }
}

#[derive(Debug, FromRow)]
struct DirectiveRow {
    ad_number: String,
    make: String,
    model: String,
    subject: Option<String>,
    status: String,
    effective_date: Option<NaiveDate>,
}

impl From<DirectiveRow> for DirectiveRecord {
    fn from(row: DirectiveRow) -> Self {
        DirectiveRecord {
            ad_number: row.ad_number,
            make: row.make,
            model: row.model,
            subject: row.subject,
            status: DirectiveStatus::from(row.status.as_str()),
            effective_date: row.effective_date,
        }
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AircraftStore for PgStore {
    async fn aircraft_by_tail(&self, tail: &str) -> ApiResult<Option<AircraftRecord>> {
        STORE_QUERIES_TOTAL.with_label_values(&["aircraft_by_tail"]).inc();

        let row = sqlx::query_as::<_, AircraftRow>(
            "SELECT tail_number, make, model, year, serial_number, owner_name, owner_count
             FROM aircraft
             WHERE tail_number = $1",
        )
        .bind(tail)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AircraftRecord::from))
    }

    async fn accidents_for_tail(&self, tail: &str) -> ApiResult<Vec<AccidentRecord>> {
        STORE_QUERIES_TOTAL.with_label_values(&["accidents_for_tail"]).inc();

        let rows = sqlx::query_as::<_, AccidentRow>(
            "SELECT tail_number, event_date, fatalities, summary
             FROM accidents
             WHERE tail_number = $1
             ORDER BY event_date DESC NULLS LAST",
        )
        .bind(tail)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AccidentRecord::from).collect())
    }

    async fn directives_for_type(&self, make: &str, model: &str) -> ApiResult<Vec<DirectiveRecord>> {
        STORE_QUERIES_TOTAL.with_label_values(&["directives_for_type"]).inc();

        let rows = sqlx::query_as::<_, DirectiveRow>(
            "SELECT ad_number, make, model, subject, status, effective_date
             FROM airworthiness_directives
             WHERE UPPER(make) = UPPER($1) AND UPPER(model) = UPPER($2)
             ORDER BY effective_date DESC NULLS LAST",
        )
        .bind(make.trim())
        .bind(model.trim())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(DirectiveRecord::from).collect())
    }

    async fn upsert_position(&self, position: &LivePosition) -> ApiResult<()> {
        STORE_QUERIES_TOTAL.with_label_values(&["upsert_position"]).inc();

        sqlx::query(
            "INSERT INTO live_positions
                (tail_number, icao24, callsign, latitude, longitude, altitude_ft,
                 ground_speed_kt, heading_deg, on_ground, observed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (tail_number) DO UPDATE
             SET icao24 = EXCLUDED.icao24, callsign = EXCLUDED.callsign,
                 latitude = EXCLUDED.latitude, longitude = EXCLUDED.longitude,
                 altitude_ft = EXCLUDED.altitude_ft, ground_speed_kt = EXCLUDED.ground_speed_kt,
                 heading_deg = EXCLUDED.heading_deg, on_ground = EXCLUDED.on_ground,
                 observed_at = EXCLUDED.observed_at",
        )
        .bind(&position.tail_number)
        .bind(&position.icao24)
        .bind(&position.callsign)
        .bind(position.latitude)
        .bind(position.longitude)
        .bind(position.altitude_ft)
        .bind(position.ground_speed_kt)
        .bind(position.heading_deg)
        .bind(position.on_ground)
        .bind(position.observed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn health_check(&self) -> ApiResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

// ===== In-memory =====

#[derive(Default)]
pub struct MemoryStore {
    aircraft: DashMap<String, AircraftRecord>,
    accidents: DashMap<String, Vec<AccidentRecord>>,
    // Map: "MAKE|MODEL" -> directives
    directives: DashMap<String, Vec<DirectiveRecord>>,
    positions: DashMap<String, LivePosition>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_aircraft(&self, aircraft: AircraftRecord) {
        self.aircraft.insert(aircraft.tail_number.clone(), aircraft);
    }

    pub fn add_accident(&self, accident: AccidentRecord) {
        self.accidents
            .entry(accident.tail_number.clone())
            .or_default()
            .push(accident);
    }

    pub fn add_directive(&self, directive: DirectiveRecord) {
        self.directives
            .entry(directive_key(&directive.make, &directive.model))
            .or_default()
            .push(directive);
    }

    pub fn position(&self, tail: &str) -> Option<LivePosition> {
        self.positions.get(tail).map(|p| p.clone())
    }
}

#[async_trait]
impl AircraftStore for MemoryStore {
    async fn aircraft_by_tail(&self, tail: &str) -> ApiResult<Option<AircraftRecord>> {
        STORE_QUERIES_TOTAL.with_label_values(&["aircraft_by_tail"]).inc();
        Ok(self.aircraft.get(tail).map(|a| a.clone()))
    }

    async fn accidents_for_tail(&self, tail: &str) -> ApiResult<Vec<AccidentRecord>> {
        STORE_QUERIES_TOTAL.with_label_values(&["accidents_for_tail"]).inc();
        Ok(self
            .accidents
            .get(tail)
            .map(|a| a.clone())
            .unwrap_or_default())
    }

    async fn directives_for_type(&self, make: &str, model: &str) -> ApiResult<Vec<DirectiveRecord>> {
        STORE_QUERIES_TOTAL.with_label_values(&["directives_for_type"]).inc();
        Ok(self
            .directives
            .get(&directive_key(make, model))
            .map(|d| d.clone())
            .unwrap_or_default())
    }

    async fn upsert_position(&self, position: &LivePosition) -> ApiResult<()> {
        STORE_QUERIES_TOTAL.with_label_values(&["upsert_position"]).inc();
        self.positions
            .insert(position.tail_number.clone(), position.clone());
        Ok(())
    }

    async fn health_check(&self) -> ApiResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_memory_store_lookups() {
        let store = MemoryStore::new();
        store.insert_aircraft(AircraftRecord::new("N123AB", "Cessna", "172S", Some(1999)));
        store.add_accident(AccidentRecord::new("N123AB", Some(1)));
        store.add_directive(DirectiveRecord::new(
            "2011-10-09",
            "CESSNA",
            "172S",
            DirectiveStatus::Open,
        ));

        let aircraft = store.aircraft_by_tail("N123AB").await.unwrap().unwrap();
        assert_eq!(aircraft.year, Some(1999));
        assert_eq!(store.accidents_for_tail("N123AB").await.unwrap().len(), 1);
        assert!(store.accidents_for_tail("N999ZZ").await.unwrap().is_empty());

        // Make/model matching ignores case
        let directives = store.directives_for_type("cessna", "172s").await.unwrap();
        assert_eq!(directives.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_upsert_replaces() {
        let store = MemoryStore::new();
        let mut position = LivePosition {
            tail_number: "N123AB".to_string(),
            icao24: "a1b2c3".to_string(),
            callsign: None,
            latitude: 40.0,
            longitude: -75.0,
            altitude_ft: None,
            ground_speed_kt: None,
            heading_deg: None,
            on_ground: true,
            observed_at: Utc::now(),
        };
        store.upsert_position(&position).await.unwrap();

        position.on_ground = false;
        position.latitude = 41.0;
        store.upsert_position(&position).await.unwrap();

        let stored = store.position("N123AB").unwrap();
        assert_eq!(stored.latitude, 41.0);
        assert!(!stored.on_ground);
    }

    #[test]
    fn test_row_conversions() {
        let accident = AccidentRecord::from(AccidentRow {
            tail_number: "N1".to_string(),
            event_date: None,
            fatalities: Some(-1),
            summary: None,
        });
        assert_eq!(accident.fatalities, None);

        let directive = DirectiveRecord::from(DirectiveRow {
            ad_number: "2020-01-01".to_string(),
            make: "PIPER".to_string(),
            model: "PA-28".to_string(),
            subject: None,
            status: "open".to_string(),
            effective_date: None,
        });
        assert!(directive.is_open());
    }
}
