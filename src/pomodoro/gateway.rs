// daily-focus-backend/src/pomodoro/gateway.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DbPool;
use crate::models::{
    NewPomodoroSession, NewPomodoroSettings, PomodoroSession, PomodoroSettings, Subtask,
};
use crate::pomodoro::controller::SessionRecord;
use crate::schema::{pomodoro_sessions, pomodoro_settings, subtasks};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("connection pool error: {0}")]
    Pool(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

/// Store operations the timer depends on.
#[async_trait]
pub trait PomodoroGateway: Send + Sync {
    async fn load_settings(&self) -> Result<PomodoroSettings, GatewayError>;

    async fn find_subtask(&self, subtask_id: Uuid) -> Result<Option<Subtask>, GatewayError>;

    /// Records the first start of a subtask; an existing start time is kept.
    async fn mark_subtask_started(
        &self,
        subtask_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    async fn mark_subtask_completed(
        &self,
        subtask_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), GatewayError>;

    async fn record_session(
        &self,
        record: &SessionRecord,
        at: DateTime<Utc>,
    ) -> Result<PomodoroSession, GatewayError>;
}

/// Returns the settings row, creating it from the defaults when the table is empty.
pub async fn load_or_init_settings(
    conn: &mut AsyncPgConnection,
) -> Result<PomodoroSettings, diesel::result::Error> {
    let existing = pomodoro_settings::table
        .order(pomodoro_settings::created_at.asc())
        .select(PomodoroSettings::as_select())
        .first::<PomodoroSettings>(conn)
        .await
        .optional()?;

    match existing {
        Some(settings) => Ok(settings),
        None => {
            log::info!("No pomodoro settings found, creating defaults");
            diesel::insert_into(pomodoro_settings::table)
                .values(&NewPomodoroSettings::default())
                .get_result::<PomodoroSettings>(conn)
                .await
        }
    }
}

/// Row for a phase the timer ran to the end at `at`; it started one full
/// duration earlier.
pub fn finished_session(record: &SessionRecord, at: DateTime<Utc>) -> NewPomodoroSession {
    let duration = i32::try_from(record.duration_minutes).unwrap_or(i32::MAX);
    NewPomodoroSession {
        task_id: record.task_id,
        session_type: record.session_type.as_str().to_string(),
        duration,
        completed: true,
        started_at: Some(at - Duration::minutes(i64::from(duration))),
        completed_at: Some(at),
    }
}

pub struct PgPomodoroGateway {
    pool: DbPool,
}

impl PgPomodoroGateway {
    pub fn new(pool: DbPool) -> Self {
        PgPomodoroGateway { pool }
    }
}

#[async_trait]
impl PomodoroGateway for PgPomodoroGateway {
    async fn load_settings(&self) -> Result<PomodoroSettings, GatewayError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Pool(e.to_string()))?;
        Ok(load_or_init_settings(&mut conn).await?)
    }

    async fn find_subtask(&self, subtask_id: Uuid) -> Result<Option<Subtask>, GatewayError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Pool(e.to_string()))?;

        let subtask = subtasks::table
            .filter(subtasks::id.eq(subtask_id))
            .select(Subtask::as_select())
            .first::<Subtask>(&mut conn)
            .await
            .optional()?;
        Ok(subtask)
    }

    async fn mark_subtask_started(
        &self,
        subtask_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Pool(e.to_string()))?;

        let updated = diesel::update(
            subtasks::table
                .filter(subtasks::id.eq(subtask_id))
                .filter(subtasks::started_at.is_null()),
        )
        .set((
            subtasks::started_at.eq(Some(at)),
            subtasks::updated_at.eq(at),
        ))
        .execute(&mut conn)
        .await?;

        log::debug!("Marked subtask {} started ({} row(s))", subtask_id, updated);
        Ok(())
    }

    async fn mark_subtask_completed(
        &self,
        subtask_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Pool(e.to_string()))?;

        let updated = diesel::update(
            subtasks::table
                .filter(subtasks::id.eq(subtask_id))
                .filter(subtasks::completed.eq(false)),
        )
        .set((
            subtasks::completed.eq(true),
            subtasks::completed_at.eq(Some(at)),
            subtasks::updated_at.eq(at),
        ))
        .execute(&mut conn)
        .await?;

        log::debug!("Marked subtask {} completed ({} row(s))", subtask_id, updated);
        Ok(())
    }

    async fn record_session(
        &self,
        record: &SessionRecord,
        at: DateTime<Utc>,
    ) -> Result<PomodoroSession, GatewayError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| GatewayError::Pool(e.to_string()))?;

        let new_session = finished_session(record, at);

        let session = diesel::insert_into(pomodoro_sessions::table)
            .values(&new_session)
            .get_result::<PomodoroSession>(&mut conn)
            .await?;
        Ok(session)
    }
}
