// daily-focus-backend/src/handlers/subtask_handlers.rs
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{CreateSubtaskPayload, Subtask, UpdateSubtaskPayload};
use crate::pomodoro::TimerService;
use crate::schema::subtasks::dsl::*;
use crate::schema::{subtasks, tasks};
use actix_web::{delete, get, patch, post, web, HttpResponse};
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
pub struct SubtaskQueryParams {
    pub task_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum SubtaskScope {
    Task(Uuid),
    Day(NaiveDate),
    All,
}

impl SubtaskQueryParams {
    /// `task_id` wins over `date`; with neither, nothing is filtered.
    pub fn scope(&self) -> SubtaskScope {
        match (self.task_id, self.date) {
            (Some(parent_id), _) => SubtaskScope::Task(parent_id),
            (None, Some(day)) => SubtaskScope::Day(day),
            (None, None) => SubtaskScope::All,
        }
    }
}

#[post("")]
pub async fn create_subtask_handler(
    pool: web::Data<DbPool>,
    payload: web::Json<CreateSubtaskPayload>,
) -> Result<HttpResponse, ServiceError> {
    let new_subtask_data = payload.into_inner().into_new_subtask()?;
    log::info!("Creating subtask: {:?}", new_subtask_data);

    let mut conn = pool.get().await?;

    let subtask = diesel::insert_into(subtasks::table)
        .values(&new_subtask_data)
        .get_result::<Subtask>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Created().json(subtask))
}

/// `?task_id=` lists one task's subtasks. `?date=` lists the subtasks of that
/// day's tasks together with the independent ones. Without either, every
/// subtask is returned. Oldest first in all cases.
#[get("")]
pub async fn list_subtasks_handler(
    pool: web::Data<DbPool>,
    query: web::Query<SubtaskQueryParams>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("Listing subtasks with params: {:?}", query.0);

    let mut conn = pool.get().await?;

    let mut query_builder = subtasks
        .order(created_at.asc())
        .select(Subtask::as_select())
        .into_boxed();

    match query.scope() {
        SubtaskScope::Task(parent_id) => {
            query_builder = query_builder.filter(task_id.eq(parent_id));
        }
        SubtaskScope::Day(day) => {
            let day_task_ids = tasks::table
                .filter(tasks::task_date.eq(day))
                .select(tasks::id)
                .load::<Uuid>(&mut conn)
                .await
                .map_err(ServiceError::from)?;
            query_builder =
                query_builder.filter(task_id.eq_any(day_task_ids).or(task_id.is_null()));
        }
        SubtaskScope::All => {}
    }

    let subtask_list = query_builder
        .load::<Subtask>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(subtask_list))
}

#[patch("/{subtask_id_path}")]
pub async fn update_subtask_handler(
    pool: web::Data<DbPool>,
    timer: web::Data<TimerService>,
    subtask_id_path: web::Path<Uuid>,
    payload: web::Json<UpdateSubtaskPayload>,
) -> Result<HttpResponse, ServiceError> {
    let subtask_to_update_id = subtask_id_path.into_inner();

    let mut conn = pool.get().await?;

    let current_subtask = subtasks
        .filter(id.eq(subtask_to_update_id))
        .select(Subtask::as_select())
        .first::<Subtask>(&mut conn)
        .await
        .optional()
        .map_err(ServiceError::from)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Subtask with id {} not found", subtask_to_update_id))
        })?;

    let subtask_changes = payload
        .into_inner()
        .into_changeset(&current_subtask, Utc::now())?;
    log::info!(
        "Updating subtask {} with {:?}",
        subtask_to_update_id,
        subtask_changes
    );

    let updated_subtask = diesel::update(subtasks.filter(id.eq(subtask_to_update_id)))
        .set(&subtask_changes)
        .get_result::<Subtask>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    // A subtask finished by hand must not stay bound to the timer.
    if updated_subtask.completed {
        timer.release_subtask(updated_subtask.id);
    }

    Ok(HttpResponse::Ok().json(updated_subtask))
}

#[delete("/{subtask_id_path}")]
pub async fn delete_subtask_handler(
    pool: web::Data<DbPool>,
    timer: web::Data<TimerService>,
    subtask_id_path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let subtask_to_delete_id = subtask_id_path.into_inner();

    let mut conn = pool.get().await?;

    let num_deleted = diesel::delete(subtasks.filter(id.eq(subtask_to_delete_id)))
        .execute(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    if num_deleted > 0 {
        log::info!("Deleted subtask {}", subtask_to_delete_id);
        timer.release_subtask(subtask_to_delete_id);
        Ok(HttpResponse::Ok().json(json!({
            "status": "success",
            "message": format!("Subtask with id {} deleted successfully", subtask_to_delete_id)
        })))
    } else {
        Err(ServiceError::NotFound(format!(
            "Subtask with id {} not found to delete",
            subtask_to_delete_id
        )))
    }
}
