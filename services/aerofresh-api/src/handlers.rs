use crate::database::AircraftStore;
use crate::errors::{ApiError, ApiResult};
use crate::metrics::{self, POSITIONS_UPSERTED, RISK_SCORES};
use crate::middleware::RequestGuard;
use crate::models::*;
use actix_web::{http::header::CACHE_CONTROL, web, HttpResponse};
use aircraft_risk::{normalize_tail, AircraftRecord, LivePosition, RiskScorer, ScoreInputs};
use tracing::{error, info};
use validator::Validate;

type Store = web::Data<dyn AircraftStore>;

// ===== Health Check =====
pub async fn health_check(store: Store) -> HttpResponse {
    let database = match store.health_check().await {
        Ok(()) => "connected",
        Err(e) => {
            error!("Store health check failed: {}", e);
            "disconnected"
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
    })
}

// ===== Prometheus Metrics =====
pub async fn metrics_endpoint() -> ApiResult<HttpResponse> {
    let body = metrics::render_metrics()
        .map_err(|e| ApiError::InternalError(format!("Failed to render metrics: {}", e)))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

async fn find_aircraft(store: &dyn AircraftStore, tail: &str) -> ApiResult<AircraftRecord> {
    store
        .aircraft_by_tail(tail)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Aircraft {} not found", tail)))
}

// ===== Aircraft =====
pub async fn get_aircraft(path: web::Path<String>, store: Store) -> ApiResult<HttpResponse> {
    let tail = normalize_tail(&path.into_inner())?;
    let aircraft = find_aircraft(store.get_ref(), &tail).await?;

    Ok(HttpResponse::Ok().json(aircraft))
}

pub async fn get_accidents(path: web::Path<String>, store: Store) -> ApiResult<HttpResponse> {
    let tail = normalize_tail(&path.into_inner())?;
    let accidents = store.accidents_for_tail(&tail).await?;

    Ok(HttpResponse::Ok().json(accidents))
}

// ===== Aircraft Summary =====
pub async fn get_summary(
    path: web::Path<String>,
    store: Store,
    scorer: web::Data<RiskScorer>,
) -> ApiResult<HttpResponse> {
    let tail = normalize_tail(&path.into_inner())?;
    let aircraft = find_aircraft(store.get_ref(), &tail).await?;

    let (accidents, directives) = tokio::try_join!(
        store.accidents_for_tail(&tail),
        store.directives_for_type(&aircraft.make, &aircraft.model),
    )?;

    let risk = scorer.assess_now(&ScoreInputs::for_aircraft(&aircraft, &accidents, &directives));
    RISK_SCORES.observe(f64::from(risk.risk_score.score()));

    info!(
        "Scored {}: {} ({} accidents, {} directives)",
        tail,
        risk.risk_score.score(),
        accidents.len(),
        directives.len()
    );

    Ok(HttpResponse::Ok().json(AircraftSummary {
        aircraft,
        accidents,
        directives,
        risk,
    }))
}

// ===== Directives =====
pub async fn get_directives(
    path: web::Path<(String, String)>,
    store: Store,
) -> ApiResult<HttpResponse> {
    let (make, model) = path.into_inner();
    if make.trim().is_empty() || model.trim().is_empty() {
        return Err(ApiError::ValidationError(
            "make and model are required".to_string(),
        ));
    }

    let directives = store.directives_for_type(&make, &model).await?;
    Ok(HttpResponse::Ok().json(directives))
}

// ===== Live Positions =====
pub async fn upsert_position(
    req: web::Json<PositionUpdateRequest>,
    store: Store,
) -> ApiResult<HttpResponse> {
    let request = req.into_inner();
    request.validate()?;

    let mut position = LivePosition::from(request);
    position.validate()?;

    store.upsert_position(&position).await?;
    POSITIONS_UPSERTED.inc();

    Ok(HttpResponse::Ok().json(PositionAck {
        status: "upserted".to_string(),
        tail_number: position.tail_number,
        observed_at: position.observed_at,
    }))
}

// ===== Guard Statistics =====
pub async fn guard_stats(guard: web::Data<RequestGuard>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((CACHE_CONTROL, "no-store"))
        .json(guard.stats())
}

// ===== Configure Routes =====
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/aircraft/{tail}", web::get().to(get_aircraft))
            .route("/aircraft/{tail}/accidents", web::get().to(get_accidents))
            .route("/aircraft/{tail}/summary", web::get().to(get_summary))
            .route("/directives/{make}/{model}", web::get().to(get_directives))
            .route("/positions", web::post().to(upsert_position))
            .route("/guard/stats", web::get().to(guard_stats)),
    )
    .route("/health", web::get().to(health_check))
    .route("/metrics", web::get().to(metrics_endpoint));
}
