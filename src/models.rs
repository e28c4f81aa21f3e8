use crate::error_handler::ServiceError;
use crate::schedule::ScheduleStatus;
use crate::schema::{pomodoro_sessions, pomodoro_settings, subtasks, tasks, users};
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// --- Helpers for partial updates: absent field -> None, JSON null -> Some(None) ---

fn deserialize_opt_opt_string<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer) {
        Ok(Some(s)) => Ok(Some(Some(s))),
        Ok(None) => Ok(Some(None)),
        Err(e) => Err(e),
    }
}

fn deserialize_opt_opt_datetime_utc<'de, D>(
    deserializer: D,
) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<DateTime<Utc>>::deserialize(deserializer) {
        Ok(Some(dt)) => Ok(Some(Some(dt))),
        Ok(None) => Ok(Some(None)),
        Err(e) => Err(e),
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

// Empty scheduled times are stored as NULL.
fn normalize_scheduled_time(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

// --- Task Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub task_date: NaiveDate,
    pub scheduled_time: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// What the frontend receives for a task: the row plus its schedule flags.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct TaskApiResponse {
    #[serde(flatten)]
    pub task: Task,
    #[serde(flatten)]
    pub schedule: ScheduleStatus,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = tasks)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub task_date: NaiveDate,
    pub scheduled_time: Option<String>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = tasks)]
pub struct UpdateTaskChangeset {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub task_date: Option<NaiveDate>,
    pub scheduled_time: Option<Option<String>>,
    pub completed: Option<bool>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Subtask Model ---
#[derive(
    Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize, Debug, Clone, PartialEq,
)]
#[diesel(table_name = subtasks)]
#[diesel(belongs_to(Task, foreign_key = task_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Subtask {
    pub id: Uuid,
    pub task_id: Option<Uuid>,
    pub title: String,
    pub estimated_minutes: i32,
    pub scheduled_time: Option<String>,
    pub completed: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = subtasks)]
pub struct NewSubtask {
    pub task_id: Option<Uuid>,
    pub title: String,
    pub estimated_minutes: i32,
    pub scheduled_time: Option<String>,
}

#[derive(AsChangeset, Debug, PartialEq)]
#[diesel(table_name = subtasks)]
pub struct UpdateSubtaskChangeset {
    pub title: Option<String>,
    pub estimated_minutes: Option<i32>,
    pub scheduled_time: Option<Option<String>>,
    pub completed: Option<bool>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Pomodoro Settings (single row) ---
pub const DEFAULT_WORK_DURATION: i32 = 25;
pub const DEFAULT_SHORT_BREAK: i32 = 5;
pub const DEFAULT_LONG_BREAK: i32 = 15;
pub const DEFAULT_SESSIONS_UNTIL_LONG_BREAK: i32 = 4;
/// Longest estimate or phase accepted, one day.
pub const MAX_DURATION_MINUTES: i32 = 24 * 60;

fn is_valid_minutes(minutes: i32) -> bool {
    (1..=MAX_DURATION_MINUTES).contains(&minutes)
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = pomodoro_settings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PomodoroSettings {
    pub id: Uuid,
    pub work_duration: i32,
    pub short_break: i32,
    pub long_break: i32,
    pub sessions_until_long_break: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = pomodoro_settings)]
pub struct NewPomodoroSettings {
    pub work_duration: i32,
    pub short_break: i32,
    pub long_break: i32,
    pub sessions_until_long_break: i32,
}

impl Default for NewPomodoroSettings {
    fn default() -> Self {
        NewPomodoroSettings {
            work_duration: DEFAULT_WORK_DURATION,
            short_break: DEFAULT_SHORT_BREAK,
            long_break: DEFAULT_LONG_BREAK,
            sessions_until_long_break: DEFAULT_SESSIONS_UNTIL_LONG_BREAK,
        }
    }
}

#[derive(AsChangeset, Debug, PartialEq)]
#[diesel(table_name = pomodoro_settings)]
pub struct UpdatePomodoroSettingsChangeset {
    pub work_duration: Option<i32>,
    pub short_break: Option<i32>,
    pub long_break: Option<i32>,
    pub sessions_until_long_break: Option<i32>,
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Pomodoro Session Model ---
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    Work,
    ShortBreak,
    LongBreak,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Work => "work",
            SessionType::ShortBreak => "short_break",
            SessionType::LongBreak => "long_break",
        }
    }

    pub fn is_break(&self) -> bool {
        !matches!(self, SessionType::Work)
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "work" => Ok(SessionType::Work),
            "short_break" => Ok(SessionType::ShortBreak),
            "long_break" => Ok(SessionType::LongBreak),
            other => Err(format!(
                "Invalid session_type '{}'. Supported: work, short_break, long_break",
                other
            )),
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = pomodoro_sessions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PomodoroSession {
    pub id: Uuid,
    pub task_id: Option<Uuid>,
    pub session_type: String,
    pub duration: i32,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// History entry: the session plus the title of its task, if any.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SessionHistoryEntry {
    #[serde(flatten)]
    pub session: PomodoroSession,
    pub task_title: Option<String>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = pomodoro_sessions)]
pub struct NewPomodoroSession {
    pub task_id: Option<Uuid>,
    pub session_type: String,
    pub duration: i32,
    pub completed: bool,
    // None lets the column default (insert time) apply.
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(AsChangeset, Debug, PartialEq)]
#[diesel(table_name = pomodoro_sessions)]
pub struct UpdatePomodoroSessionChangeset {
    pub completed: Option<bool>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

// --- User Model ---
#[derive(Queryable, Selectable, Identifiable, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, PartialEq)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

// --- PAYLOAD DTOs ---

#[derive(Deserialize, Debug, Default)]
pub struct CreateTaskPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub task_date: Option<NaiveDate>,
    pub scheduled_time: Option<String>,
}

impl CreateTaskPayload {
    pub fn into_new_task(self) -> Result<NewTask, ServiceError> {
        let task_date = match (is_blank(&self.title), self.task_date) {
            (false, Some(date)) => date,
            _ => {
                return Err(ServiceError::BadRequest(
                    "Title and task_date are required".to_string(),
                ))
            }
        };

        Ok(NewTask {
            title: self.title.unwrap_or_default(),
            description: self.description,
            task_date,
            scheduled_time: normalize_scheduled_time(self.scheduled_time),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateTaskPayload {
    pub title: Option<String>,
    #[serde(deserialize_with = "deserialize_opt_opt_string", default)]
    pub description: Option<Option<String>>,
    pub task_date: Option<NaiveDate>,
    #[serde(deserialize_with = "deserialize_opt_opt_string", default)]
    pub scheduled_time: Option<Option<String>>,
    pub completed: Option<bool>,
}

impl UpdateTaskPayload {
    pub fn into_changeset(self, now: DateTime<Utc>) -> Result<UpdateTaskChangeset, ServiceError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::BadRequest("Title cannot be empty".to_string()));
        }

        Ok(UpdateTaskChangeset {
            title: self.title,
            description: self.description,
            task_date: self.task_date,
            scheduled_time: self.scheduled_time.map(normalize_scheduled_time),
            completed: self.completed,
            updated_at: Some(now),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct CreateSubtaskPayload {
    pub task_id: Option<Uuid>,
    pub title: Option<String>,
    pub estimated_minutes: Option<i32>,
    pub scheduled_time: Option<String>,
}

impl CreateSubtaskPayload {
    pub fn into_new_subtask(self) -> Result<NewSubtask, ServiceError> {
        let estimated_minutes = match (is_blank(&self.title), self.estimated_minutes) {
            (false, Some(minutes)) if is_valid_minutes(minutes) => minutes,
            _ => {
                return Err(ServiceError::BadRequest(format!(
                    "Title and an estimated_minutes between 1 and {} are required",
                    MAX_DURATION_MINUTES
                )))
            }
        };

        Ok(NewSubtask {
            task_id: self.task_id,
            title: self.title.unwrap_or_default(),
            estimated_minutes,
            scheduled_time: normalize_scheduled_time(self.scheduled_time),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdateSubtaskPayload {
    pub title: Option<String>,
    pub estimated_minutes: Option<i32>,
    #[serde(deserialize_with = "deserialize_opt_opt_string", default)]
    pub scheduled_time: Option<Option<String>>,
    pub completed: Option<bool>,
    // Start times can be recorded but never cleared.
    pub started_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "deserialize_opt_opt_datetime_utc", default)]
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl UpdateSubtaskPayload {
    /// Builds the changeset against the stored row. `completed_at` is stamped
    /// with `now` only when the subtask moves from open to completed and the
    /// caller did not supply a timestamp.
    pub fn into_changeset(
        self,
        current: &Subtask,
        now: DateTime<Utc>,
    ) -> Result<UpdateSubtaskChangeset, ServiceError> {
        if self.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(ServiceError::BadRequest("Title cannot be empty".to_string()));
        }
        if self.estimated_minutes.is_some_and(|m| !is_valid_minutes(m)) {
            return Err(ServiceError::BadRequest(format!(
                "estimated_minutes must be between 1 and {}",
                MAX_DURATION_MINUTES
            )));
        }

        let completed_at = match (self.completed_at, self.completed) {
            (Some(explicit), _) => Some(explicit),
            (None, Some(true)) if !current.completed => Some(Some(now)),
            (None, _) => None,
        };

        Ok(UpdateSubtaskChangeset {
            title: self.title,
            estimated_minutes: self.estimated_minutes,
            scheduled_time: self.scheduled_time.map(normalize_scheduled_time),
            completed: self.completed,
            started_at: self.started_at,
            completed_at,
            updated_at: Some(now),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdatePomodoroSettingsPayload {
    pub work_duration: Option<i32>,
    pub short_break: Option<i32>,
    pub long_break: Option<i32>,
    pub sessions_until_long_break: Option<i32>,
}

impl UpdatePomodoroSettingsPayload {
    pub fn into_changeset(
        self,
        now: DateTime<Utc>,
    ) -> Result<UpdatePomodoroSettingsChangeset, ServiceError> {
        let durations = [
            ("work_duration", self.work_duration),
            ("short_break", self.short_break),
            ("long_break", self.long_break),
        ];
        if let Some((name, _)) = durations
            .iter()
            .find(|(_, value)| value.is_some_and(|v| !is_valid_minutes(v)))
        {
            return Err(ServiceError::BadRequest(format!(
                "{} must be between 1 and {}",
                name, MAX_DURATION_MINUTES
            )));
        }
        if self.sessions_until_long_break.is_some_and(|v| v <= 0) {
            return Err(ServiceError::BadRequest(
                "sessions_until_long_break must be positive".to_string(),
            ));
        }

        Ok(UpdatePomodoroSettingsChangeset {
            work_duration: self.work_duration,
            short_break: self.short_break,
            long_break: self.long_break,
            sessions_until_long_break: self.sessions_until_long_break,
            updated_at: Some(now),
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct CreatePomodoroSessionPayload {
    pub task_id: Option<Uuid>,
    pub session_type: Option<String>,
    pub duration: Option<i32>,
}

impl CreatePomodoroSessionPayload {
    pub fn into_new_session(self) -> Result<NewPomodoroSession, ServiceError> {
        let (raw_type, duration) = match (self.session_type, self.duration) {
            (Some(t), Some(d)) if !t.trim().is_empty() && is_valid_minutes(d) => (t, d),
            _ => {
                return Err(ServiceError::BadRequest(
                    "session_type and duration are required".to_string(),
                ))
            }
        };
        let session_type = raw_type
            .trim()
            .parse::<SessionType>()
            .map_err(ServiceError::BadRequest)?;

        Ok(NewPomodoroSession {
            task_id: self.task_id,
            session_type: session_type.as_str().to_string(),
            duration,
            completed: false,
            started_at: None,
            completed_at: None,
        })
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct UpdatePomodoroSessionPayload {
    pub completed: Option<bool>,
}

impl UpdatePomodoroSessionPayload {
    pub fn into_changeset(
        self,
        now: DateTime<Utc>,
    ) -> Result<UpdatePomodoroSessionChangeset, ServiceError> {
        match self.completed {
            Some(true) => Ok(UpdatePomodoroSessionChangeset {
                completed: Some(true),
                completed_at: Some(Some(now)),
            }),
            Some(false) => Ok(UpdatePomodoroSessionChangeset {
                completed: Some(false),
                completed_at: None,
            }),
            None => Err(ServiceError::BadRequest("completed is required".to_string())),
        }
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct CreateUserPayload {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CreateUserPayload {
    pub fn into_new_user(self) -> Result<NewUser, ServiceError> {
        match (self.name, self.email) {
            (Some(name), Some(email)) if !name.trim().is_empty() && !email.trim().is_empty() => {
                Ok(NewUser {
                    name,
                    email: email.trim().to_string(),
                })
            }
            _ => Err(ServiceError::BadRequest(
                "Name and email are required".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    fn stored_subtask(completed: bool) -> Subtask {
        Subtask {
            id: Uuid::new_v4(),
            task_id: None,
            title: "Write outline".to_string(),
            estimated_minutes: 10,
            scheduled_time: None,
            completed,
            started_at: None,
            completed_at: None,
            created_at: noon(),
            updated_at: noon(),
        }
    }

    #[test]
    fn task_creation_requires_title_and_date() {
        let missing_date = CreateTaskPayload {
            title: Some("Review".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            missing_date.into_new_task(),
            Err(ServiceError::BadRequest(_))
        ));

        let blank_title = CreateTaskPayload {
            title: Some("  ".to_string()),
            task_date: NaiveDate::from_ymd_opt(2025, 6, 2),
            ..Default::default()
        };
        assert!(blank_title.into_new_task().is_err());

        let ok = CreateTaskPayload {
            title: Some("Review".to_string()),
            task_date: NaiveDate::from_ymd_opt(2025, 6, 2),
            scheduled_time: Some("".to_string()),
            ..Default::default()
        }
        .into_new_task()
        .expect("valid task");
        assert_eq!(ok.scheduled_time, None);
    }

    #[test]
    fn subtask_creation_requires_positive_estimate() {
        for minutes in [None, Some(0), Some(-5), Some(100_000_000)] {
            let payload = CreateSubtaskPayload {
                title: Some("Draft".to_string()),
                estimated_minutes: minutes,
                ..Default::default()
            };
            assert!(payload.into_new_subtask().is_err(), "{:?}", minutes);
        }

        let independent = CreateSubtaskPayload {
            title: Some("Draft".to_string()),
            estimated_minutes: Some(15),
            ..Default::default()
        }
        .into_new_subtask()
        .expect("valid subtask");
        assert_eq!(independent.task_id, None);
        assert_eq!(independent.estimated_minutes, 15);
    }

    #[test]
    fn completing_an_open_subtask_stamps_completed_at() {
        let payload = UpdateSubtaskPayload {
            completed: Some(true),
            ..Default::default()
        };
        let changes = payload
            .into_changeset(&stored_subtask(false), noon())
            .expect("changeset");
        assert_eq!(changes.completed_at, Some(Some(noon())));
    }

    #[test]
    fn completing_an_already_completed_subtask_keeps_completed_at() {
        let payload = UpdateSubtaskPayload {
            completed: Some(true),
            ..Default::default()
        };
        let changes = payload
            .into_changeset(&stored_subtask(true), noon())
            .expect("changeset");
        assert_eq!(changes.completed_at, None);
    }

    #[test]
    fn explicit_completed_at_wins() {
        let earlier = Utc.with_ymd_and_hms(2025, 6, 2, 9, 30, 0).unwrap();
        let payload = UpdateSubtaskPayload {
            completed: Some(true),
            completed_at: Some(Some(earlier)),
            ..Default::default()
        };
        let changes = payload
            .into_changeset(&stored_subtask(false), noon())
            .expect("changeset");
        assert_eq!(changes.completed_at, Some(Some(earlier)));
    }

    #[test]
    fn partial_subtask_update_distinguishes_null_from_absent() {
        let cleared: UpdateSubtaskPayload =
            serde_json::from_str(r#"{"scheduled_time": null}"#).expect("json");
        assert_eq!(cleared.scheduled_time, Some(None));

        let untouched: UpdateSubtaskPayload = serde_json::from_str("{}").expect("json");
        assert_eq!(untouched.scheduled_time, None);
    }

    #[test]
    fn session_creation_validates_type_and_duration() {
        let missing = CreatePomodoroSessionPayload {
            session_type: Some("work".to_string()),
            ..Default::default()
        };
        assert!(missing.into_new_session().is_err());

        let unknown = CreatePomodoroSessionPayload {
            session_type: Some("nap".to_string()),
            duration: Some(20),
            ..Default::default()
        };
        assert!(unknown.into_new_session().is_err());

        let ok = CreatePomodoroSessionPayload {
            session_type: Some("short_break".to_string()),
            duration: Some(5),
            ..Default::default()
        }
        .into_new_session()
        .expect("valid session");
        assert_eq!(ok.session_type, "short_break");
        assert!(!ok.completed);
    }

    #[test]
    fn marking_a_session_completed_sets_timestamp() {
        let changes = UpdatePomodoroSessionPayload {
            completed: Some(true),
        }
        .into_changeset(noon())
        .expect("changeset");
        assert_eq!(changes.completed_at, Some(Some(noon())));

        assert!(UpdatePomodoroSessionPayload::default()
            .into_changeset(noon())
            .is_err());
    }

    #[test]
    fn settings_update_rejects_non_positive_values() {
        let payload = UpdatePomodoroSettingsPayload {
            long_break: Some(0),
            ..Default::default()
        };
        match payload.into_changeset(noon()) {
            Err(ServiceError::BadRequest(msg)) => assert!(msg.contains("long_break")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn durations_above_one_day_are_rejected() {
        let settings = UpdatePomodoroSettingsPayload {
            work_duration: Some(MAX_DURATION_MINUTES + 1),
            ..Default::default()
        };
        assert!(matches!(
            settings.into_changeset(noon()),
            Err(ServiceError::BadRequest(_))
        ));

        let estimate = UpdateSubtaskPayload {
            estimated_minutes: Some(100_000_000),
            ..Default::default()
        };
        assert!(estimate.into_changeset(&stored_subtask(false), noon()).is_err());

        let full_day = CreateSubtaskPayload {
            title: Some("Deep work".to_string()),
            estimated_minutes: Some(MAX_DURATION_MINUTES),
            ..Default::default()
        };
        assert!(full_day.into_new_subtask().is_ok());
    }

    #[test]
    fn user_creation_requires_name_and_email() {
        assert!(CreateUserPayload {
            name: Some("Ana".to_string()),
            email: None,
        }
        .into_new_user()
        .is_err());

        let user = CreateUserPayload {
            name: Some("Ana".to_string()),
            email: Some(" ana@example.com ".to_string()),
        }
        .into_new_user()
        .expect("valid user");
        assert_eq!(user.email, "ana@example.com");
    }

    #[test]
    fn session_type_round_trips_through_text() {
        for session_type in [SessionType::Work, SessionType::ShortBreak, SessionType::LongBreak] {
            assert_eq!(session_type.as_str().parse::<SessionType>(), Ok(session_type));
        }
        assert!(SessionType::LongBreak.is_break());
    }
}
