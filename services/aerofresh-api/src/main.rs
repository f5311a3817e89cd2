use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use aerofresh_api::{
    config::Config, database, handlers, AircraftStore, MemoryStore, PgStore, RequestGuard,
};
use aircraft_risk::RiskScorer;
use dotenv::dotenv;
use std::io::{Error, ErrorKind};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    info!("Starting AeroFresh API...");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        Error::new(ErrorKind::InvalidInput, format!("Invalid configuration: {}", e))
    })?;
    info!("Configuration loaded successfully");

    let store: Arc<dyn AircraftStore> = if config.database.in_memory {
        warn!("Running against the in-memory store; data is not persisted");
        Arc::new(MemoryStore::new())
    } else {
        info!("Connecting to database at {}", config.database.url);
        let pool = match database::create_pool(
            &config.database.url,
            config.database.max_connections,
        )
        .await
        {
            Ok(p) => {
                info!("Database connection pool created successfully");
                p
            }
            Err(e) => {
                error!("Failed to create database pool: {}", e);
                return Err(Error::new(
                    ErrorKind::Other,
                    format!("Database connection failed: {}", e),
                ));
            }
        };

        if let Err(e) = database::health_check(&pool).await {
            error!("Database health check failed: {}", e);
            return Err(Error::new(ErrorKind::Other, "Database not accessible"));
        }
        info!("Database health check passed");

        Arc::new(PgStore::new(pool))
    };

    let scorer = RiskScorer::with_formula(config.risk.formula);
    let guard = RequestGuard::new(config.rate_limit.to_config(), config.cache.to_config());

    info!(
        "Request guard: {} requests per {}ms, cache ttl {}ms ({} entries, enabled={})",
        config.rate_limit.max_requests,
        config.rate_limit.window_ms,
        config.cache.ttl_ms,
        config.cache.max_entries,
        config.cache.enabled
    );

    let server_config = config.server.clone();

    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(store.clone()))
            .app_data(web::Data::new(scorer))
            .app_data(web::Data::new(guard.clone()))
            .wrap(guard.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(middleware::Logger::default())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await
}
