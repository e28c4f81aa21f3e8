// daily-focus-backend/src/handlers/pomodoro_handlers.rs
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{
    CreatePomodoroSessionPayload, PomodoroSession, PomodoroSettings, SessionHistoryEntry,
    UpdatePomodoroSessionPayload, UpdatePomodoroSettingsPayload,
};
use crate::pomodoro::gateway::load_or_init_settings;
use crate::pomodoro::{TimerDurations, TimerService};
use crate::schema::{pomodoro_sessions, pomodoro_settings, tasks};
use actix_web::{get, patch, post, web, HttpResponse};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use uuid::Uuid;

const DEFAULT_HISTORY_LIMIT: i64 = 10;
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Deserialize, Debug)]
pub struct SessionQueryParams {
    pub limit: Option<i64>,
}

fn history_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT)
}

// --- Settings ---

#[get("/settings")]
pub async fn get_settings_handler(pool: web::Data<DbPool>) -> Result<HttpResponse, ServiceError> {
    let mut conn = pool.get().await?;

    let settings = load_or_init_settings(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(settings))
}

#[patch("/settings")]
pub async fn update_settings_handler(
    pool: web::Data<DbPool>,
    timer: web::Data<TimerService>,
    payload: web::Json<UpdatePomodoroSettingsPayload>,
) -> Result<HttpResponse, ServiceError> {
    let settings_changes = payload.into_inner().into_changeset(Utc::now())?;
    log::info!("Updating pomodoro settings with {:?}", settings_changes);

    let mut conn = pool.get().await?;

    let current_settings = load_or_init_settings(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let updated_settings = diesel::update(
        pomodoro_settings::table.filter(pomodoro_settings::id.eq(current_settings.id)),
    )
    .set(&settings_changes)
    .get_result::<PomodoroSettings>(&mut conn)
    .await
    .map_err(ServiceError::from)?;

    timer.apply_durations(TimerDurations::from(&updated_settings));

    Ok(HttpResponse::Ok().json(updated_settings))
}

// --- Sessions ---

#[get("/sessions")]
pub async fn list_sessions_handler(
    pool: web::Data<DbPool>,
    query: web::Query<SessionQueryParams>,
) -> Result<HttpResponse, ServiceError> {
    let limit = history_limit(query.limit);

    let mut conn = pool.get().await?;

    let rows = pomodoro_sessions::table
        .left_join(tasks::table)
        .order(pomodoro_sessions::started_at.desc())
        .limit(limit)
        .select((PomodoroSession::as_select(), tasks::title.nullable()))
        .load::<(PomodoroSession, Option<String>)>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let history: Vec<SessionHistoryEntry> = rows
        .into_iter()
        .map(|(session, task_title)| SessionHistoryEntry {
            session,
            task_title,
        })
        .collect();

    Ok(HttpResponse::Ok().json(history))
}

#[post("/sessions")]
pub async fn create_session_handler(
    pool: web::Data<DbPool>,
    payload: web::Json<CreatePomodoroSessionPayload>,
) -> Result<HttpResponse, ServiceError> {
    let new_session_data = payload.into_inner().into_new_session()?;
    log::info!("Creating pomodoro session: {:?}", new_session_data);

    let mut conn = pool.get().await?;

    let session = diesel::insert_into(pomodoro_sessions::table)
        .values(&new_session_data)
        .get_result::<PomodoroSession>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Created().json(session))
}

#[patch("/sessions/{session_id_path}")]
pub async fn update_session_handler(
    pool: web::Data<DbPool>,
    session_id_path: web::Path<Uuid>,
    payload: web::Json<UpdatePomodoroSessionPayload>,
) -> Result<HttpResponse, ServiceError> {
    let session_to_update_id = session_id_path.into_inner();
    let session_changes = payload.into_inner().into_changeset(Utc::now())?;

    let mut conn = pool.get().await?;

    let updated_session = diesel::update(
        pomodoro_sessions::table.filter(pomodoro_sessions::id.eq(session_to_update_id)),
    )
    .set(&session_changes)
    .get_result::<PomodoroSession>(&mut conn)
    .await
    .optional()
    .map_err(ServiceError::from)?
    .ok_or_else(|| {
        ServiceError::NotFound(format!(
            "Pomodoro session with id {} not found",
            session_to_update_id
        ))
    })?;

    Ok(HttpResponse::Ok().json(updated_session))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_limit_defaults_and_clamps() {
        assert_eq!(history_limit(None), 10);
        assert_eq!(history_limit(Some(3)), 3);
        assert_eq!(history_limit(Some(0)), 1);
        assert_eq!(history_limit(Some(5_000)), 100);
    }
}
