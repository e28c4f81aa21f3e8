// daily-focus-backend/src/handlers/schedule_handlers.rs
use crate::error_handler::ServiceError;
use crate::schedule::{current_time, parse_time_of_day, time_label, ScheduleStatus};
use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Debug)]
pub struct ScheduleStatusQuery {
    pub scheduled_time: Option<String>,
    /// Comma-separated `HH:mm` values of the day's other entries.
    pub times: Option<String>,
    /// Overrides the server clock, `HH:mm`.
    pub now: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct ScheduleStatusResponse {
    #[serde(flatten)]
    pub status: ScheduleStatus,
    pub now: String,
}

fn split_times(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|time| !time.is_empty())
        .map(str::to_string)
        .collect()
}

#[get("/status")]
pub async fn schedule_status_handler(
    query: web::Query<ScheduleStatusQuery>,
) -> Result<HttpResponse, ServiceError> {
    let query = query.into_inner();

    let now = match query.now.as_deref() {
        Some(raw) => parse_time_of_day(raw).ok_or_else(|| {
            ServiceError::BadRequest(format!("Invalid now '{}', expected HH:mm", raw))
        })?,
        None => current_time(),
    };
    let times = query.times.as_deref().map(split_times);

    let status = ScheduleStatus::evaluate(
        query.scheduled_time.as_deref(),
        times.as_deref(),
        now,
    );

    Ok(HttpResponse::Ok().json(ScheduleStatusResponse {
        status,
        now: time_label(now),
    }))
}
