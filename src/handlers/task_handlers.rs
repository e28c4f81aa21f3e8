// daily-focus-backend/src/handlers/task_handlers.rs
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{CreateTaskPayload, Task, TaskApiResponse, UpdateTaskPayload};
use crate::schedule::{compare_scheduled_times, ScheduleStatus};
use crate::schema::tasks::dsl::*;
use crate::schema::tasks;
use actix_web::{delete, get, patch, post, web, HttpResponse};
use chrono::{Local, NaiveDate, NaiveTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Deserialize, Debug)]
pub struct TaskQueryParams {
    pub date: Option<NaiveDate>,
}

/// Orders tasks by day then scheduled time (unscheduled last) and attaches
/// schedule flags. Only tasks dated `today` can be active or upcoming.
pub fn annotate_tasks(
    mut task_list: Vec<Task>,
    today: NaiveDate,
    now: NaiveTime,
) -> Vec<TaskApiResponse> {
    let todays_times: Vec<String> = task_list
        .iter()
        .filter(|task| task.task_date == today)
        .filter_map(|task| task.scheduled_time.clone())
        .collect();

    task_list.sort_by(|a, b| {
        a.task_date.cmp(&b.task_date).then_with(|| {
            compare_scheduled_times(a.scheduled_time.as_deref(), b.scheduled_time.as_deref())
        })
    });

    task_list
        .into_iter()
        .map(|task| {
            let schedule = schedule_for(&task, &todays_times, today, now);
            TaskApiResponse { task, schedule }
        })
        .collect()
}

fn schedule_for(task: &Task, day_times: &[String], today: NaiveDate, now: NaiveTime) -> ScheduleStatus {
    if task.task_date == today {
        ScheduleStatus::evaluate(task.scheduled_time.as_deref(), Some(day_times), now)
    } else {
        ScheduleStatus::inactive(task.scheduled_time.as_deref())
    }
}

// Single-task responses compare against the other tasks of the same day.
async fn to_api_response(
    conn: &mut AsyncPgConnection,
    task: Task,
) -> Result<TaskApiResponse, ServiceError> {
    let day_times = tasks
        .filter(task_date.eq(task.task_date))
        .filter(scheduled_time.is_not_null())
        .select(scheduled_time)
        .load::<Option<String>>(conn)
        .await
        .map_err(ServiceError::from)?
        .into_iter()
        .flatten()
        .collect::<Vec<String>>();

    let now = Local::now();
    let schedule = schedule_for(&task, &day_times, now.date_naive(), now.time());
    Ok(TaskApiResponse { task, schedule })
}

#[post("")]
pub async fn create_task_handler(
    pool: web::Data<DbPool>,
    payload: web::Json<CreateTaskPayload>,
) -> Result<HttpResponse, ServiceError> {
    let new_task_data = payload.into_inner().into_new_task()?;
    log::info!("Creating task: {:?}", new_task_data);

    let mut conn = pool.get().await?;

    let task = diesel::insert_into(tasks::table)
        .values(&new_task_data)
        .get_result::<Task>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let task_response = to_api_response(&mut conn, task).await?;
    Ok(HttpResponse::Created().json(task_response))
}

#[get("")]
pub async fn list_tasks_handler(
    pool: web::Data<DbPool>,
    query: web::Query<TaskQueryParams>,
) -> Result<HttpResponse, ServiceError> {
    log::info!("Listing tasks with params: {:?}", query.0);

    let mut conn = pool.get().await?;

    let mut query_builder = tasks
        .order(created_at.desc())
        .select(Task::as_select())
        .into_boxed();

    if let Some(day) = query.date {
        query_builder = query_builder.filter(task_date.eq(day));
    }

    let task_list = query_builder
        .load::<Task>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    let now = Local::now();
    let task_responses = annotate_tasks(task_list, now.date_naive(), now.time());

    Ok(HttpResponse::Ok().json(task_responses))
}

#[get("/{task_id_path}")]
pub async fn get_task_handler(
    pool: web::Data<DbPool>,
    task_id_path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let task_to_find_id = task_id_path.into_inner();

    let mut conn = pool.get().await?;

    let task_option = tasks
        .filter(id.eq(task_to_find_id))
        .select(Task::as_select())
        .first::<Task>(&mut conn)
        .await
        .optional()
        .map_err(ServiceError::from)?;

    match task_option {
        Some(task) => {
            let task_response = to_api_response(&mut conn, task).await?;
            Ok(HttpResponse::Ok().json(task_response))
        }
        None => Err(ServiceError::NotFound(format!(
            "Task with id {} not found",
            task_to_find_id
        ))),
    }
}

#[patch("/{task_id_path}")]
pub async fn update_task_handler(
    pool: web::Data<DbPool>,
    task_id_path: web::Path<Uuid>,
    payload: web::Json<UpdateTaskPayload>,
) -> Result<HttpResponse, ServiceError> {
    let task_to_update_id = task_id_path.into_inner();
    let task_changes = payload.into_inner().into_changeset(Utc::now())?;
    log::info!("Updating task {} with {:?}", task_to_update_id, task_changes);

    let mut conn = pool.get().await?;

    let updated_task = diesel::update(tasks.filter(id.eq(task_to_update_id)))
        .set(&task_changes)
        .get_result::<Task>(&mut conn)
        .await
        .optional()
        .map_err(ServiceError::from)?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Task with id {} not found", task_to_update_id))
        })?;

    let task_response = to_api_response(&mut conn, updated_task).await?;
    Ok(HttpResponse::Ok().json(task_response))
}

#[delete("/{task_id_path}")]
pub async fn delete_task_handler(
    pool: web::Data<DbPool>,
    task_id_path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let task_to_delete_id = task_id_path.into_inner();

    let mut conn = pool.get().await?;

    // Subtasks and sessions keep their rows; the foreign keys are nulled.
    let num_deleted = diesel::delete(tasks.filter(id.eq(task_to_delete_id)))
        .execute(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    if num_deleted > 0 {
        log::info!("Deleted task {}", task_to_delete_id);
        Ok(HttpResponse::Ok().json(json!({
            "status": "success",
            "message": format!("Task with id {} deleted successfully", task_to_delete_id)
        })))
    } else {
        Err(ServiceError::NotFound(format!(
            "Task with id {} not found to delete",
            task_to_delete_id
        )))
    }
}
