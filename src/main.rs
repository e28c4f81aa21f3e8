// daily-focus-backend/src/main.rs
mod config;
mod db;
mod error_handler;
mod handlers;
mod models;
mod pomodoro;
mod schedule;
pub mod schema;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpResponse, HttpServer};
use config::AppConfig;
use db::DbPool;
use pomodoro::{
    spawn_ticker, PgPomodoroGateway, PomodoroController, PomodoroGateway, TerminalBell,
    TimerDurations, TimerService,
};
use std::io;
use std::sync::Arc;

async fn health_check_handler(
    pool: web::Data<DbPool>,
) -> Result<HttpResponse, error_handler::ServiceError> {
    match pool.get().await {
        Ok(_conn) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "message": "Backend is running and DB pool accessible"
        }))),
        Err(e) => {
            log::error!("Failed to get connection from pool: {:?}", e);
            Err(error_handler::ServiceError::InternalServerError(
                "Failed to check DB pool".to_string(),
            ))
        }
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init();

    if cfg!(debug_assertions) {
        match dotenvy::dotenv() {
            Ok(path) => log::info!(".env file loaded from path: {}", path.display()),
            Err(e) => log::warn!(
                "Could not load .env file: {}, using environment variables.",
                e
            ),
        }
    }

    let config = AppConfig::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let pool = db::create_pool(&config.database_url, config.pool_size)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    let gateway: Arc<dyn PomodoroGateway> = Arc::new(PgPomodoroGateway::new(pool.clone()));
    let durations = match gateway.load_settings().await {
        Ok(settings) => TimerDurations::from(&settings),
        Err(e) => {
            log::warn!("Could not load pomodoro settings, using defaults: {}", e);
            TimerDurations::default()
        }
    };

    let timer = Arc::new(TimerService::new(
        PomodoroController::new(durations),
        gateway,
        Arc::new(TerminalBell),
    ));
    let ticker = spawn_ticker(Arc::clone(&timer));

    log::info!("Daily Focus backend starting...");
    log::info!("Server will start at http://{}", config.bind_address());

    let frontend_origins = config.frontend_origins.clone();
    let timer_data = web::Data::from(timer);

    let result = HttpServer::new(move || {
        let cors = frontend_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allowed_methods(vec!["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(web::Data::new(pool.clone()))
            .app_data(timer_data.clone())
            .service(web::resource("/health").route(web::get().to(health_check_handler)))
            .configure(handlers::configure)
    })
    .bind(config.bind_address())?
    .run()
    .await;

    ticker.abort();
    result
}
