// daily-focus-backend/src/handlers/timer_handlers.rs
use crate::error_handler::ServiceError;
use crate::models::SessionType;
use crate::pomodoro::{BoundSubtask, TimerService};
use actix_web::{delete, get, post, web, HttpResponse};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
pub struct SelectPhasePayload {
    pub phase: SessionType,
}

#[derive(Deserialize, Debug)]
pub struct SelectSubtaskPayload {
    pub subtask_id: Uuid,
}

#[get("/timer")]
pub async fn get_timer_handler(timer: web::Data<TimerService>) -> HttpResponse {
    HttpResponse::Ok().json(timer.snapshot())
}

#[post("/timer/start")]
pub async fn start_timer_handler(timer: web::Data<TimerService>) -> HttpResponse {
    HttpResponse::Ok().json(timer.start(Utc::now()))
}

#[post("/timer/pause")]
pub async fn pause_timer_handler(timer: web::Data<TimerService>) -> HttpResponse {
    HttpResponse::Ok().json(timer.pause())
}

#[post("/timer/toggle")]
pub async fn toggle_timer_handler(timer: web::Data<TimerService>) -> HttpResponse {
    HttpResponse::Ok().json(timer.toggle(Utc::now()))
}

#[post("/timer/reset")]
pub async fn reset_timer_handler(timer: web::Data<TimerService>) -> HttpResponse {
    HttpResponse::Ok().json(timer.reset())
}

#[post("/timer/phase")]
pub async fn select_phase_handler(
    timer: web::Data<TimerService>,
    payload: web::Json<SelectPhasePayload>,
) -> HttpResponse {
    log::info!("Timer phase selected: {}", payload.phase);
    HttpResponse::Ok().json(timer.select_phase(payload.phase))
}

#[post("/timer/subtask")]
pub async fn select_subtask_handler(
    timer: web::Data<TimerService>,
    payload: web::Json<SelectSubtaskPayload>,
) -> Result<HttpResponse, ServiceError> {
    let subtask_to_bind_id = payload.subtask_id;

    let subtask = timer
        .gateway()
        .find_subtask(subtask_to_bind_id)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Subtask with id {} not found", subtask_to_bind_id))
        })?;

    let bound = BoundSubtask::try_from(&subtask)?;
    let snapshot = timer.select_subtask(bound)?;
    log::info!("Subtask {} bound to the timer", subtask_to_bind_id);

    Ok(HttpResponse::Ok().json(snapshot))
}

#[delete("/timer/subtask")]
pub async fn release_subtask_handler(timer: web::Data<TimerService>) -> HttpResponse {
    HttpResponse::Ok().json(timer.release_current_subtask())
}
