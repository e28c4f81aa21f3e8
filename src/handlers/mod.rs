pub mod pomodoro_handlers;
pub mod schedule_handlers;
pub mod subtask_handlers;
pub mod task_handlers;
pub mod timer_handlers;
pub mod user_handlers;

use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tasks")
            .service(task_handlers::create_task_handler)
            .service(task_handlers::list_tasks_handler)
            .service(task_handlers::get_task_handler)
            .service(task_handlers::update_task_handler)
            .service(task_handlers::delete_task_handler),
    )
    .service(
        web::scope("/subtasks")
            .service(subtask_handlers::create_subtask_handler)
            .service(subtask_handlers::list_subtasks_handler)
            .service(subtask_handlers::update_subtask_handler)
            .service(subtask_handlers::delete_subtask_handler),
    )
    .service(
        web::scope("/pomodoro")
            .service(pomodoro_handlers::get_settings_handler)
            .service(pomodoro_handlers::update_settings_handler)
            .service(pomodoro_handlers::list_sessions_handler)
            .service(pomodoro_handlers::create_session_handler)
            .service(pomodoro_handlers::update_session_handler)
            .service(timer_handlers::get_timer_handler)
            .service(timer_handlers::start_timer_handler)
            .service(timer_handlers::pause_timer_handler)
            .service(timer_handlers::toggle_timer_handler)
            .service(timer_handlers::reset_timer_handler)
            .service(timer_handlers::select_phase_handler)
            .service(timer_handlers::select_subtask_handler)
            .service(timer_handlers::release_subtask_handler),
    )
    .service(
        web::scope("/users")
            .service(user_handlers::list_users_handler)
            .service(user_handlers::create_user_handler),
    )
    .service(web::scope("/schedule").service(schedule_handlers::schedule_status_handler));
}

#[cfg(test)]
mod tests {
    use super::configure;
    use crate::db::unconnected_pool;
    use crate::models::Subtask;
    use crate::pomodoro::gateway::memory::InMemoryGateway;
    use crate::pomodoro::{PomodoroController, TerminalBell, TimerDurations, TimerService};
    use actix_web::http::StatusCode;
    use actix_web::{test, web, App};
    use chrono::Utc;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use uuid::Uuid;

    fn timer_with(gateway: InMemoryGateway) -> web::Data<TimerService> {
        timer_over(Arc::new(gateway))
    }

    fn timer_over(gateway: Arc<InMemoryGateway>) -> web::Data<TimerService> {
        web::Data::new(TimerService::new(
            PomodoroController::new(TimerDurations::default()),
            gateway,
            Arc::new(TerminalBell),
        ))
    }

    fn open_subtask(minutes: i32) -> Subtask {
        let now = Utc::now();
        Subtask {
            id: Uuid::new_v4(),
            task_id: Some(Uuid::new_v4()),
            title: "Outline chapter".to_string(),
            estimated_minutes: minutes,
            scheduled_time: None,
            completed: false,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    macro_rules! init_app {
        ($timer:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new(unconnected_pool()))
                    .app_data($timer.clone())
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn invalid_payloads_are_rejected_before_the_database() {
        let timer = timer_with(InMemoryGateway::default());
        let app = init_app!(timer);

        let cases = [
            ("/tasks", json!({ "title": "No date" })),
            ("/subtasks", json!({ "title": "Draft", "estimated_minutes": 0 })),
            ("/pomodoro/sessions", json!({ "session_type": "nap", "duration": 5 })),
            ("/users", json!({ "name": "Ana" })),
        ];

        for (uri, body) in cases {
            let req = test::TestRequest::post().uri(uri).set_json(&body).to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "POST {}", uri);

            let body: Value = test::read_body_json(resp).await;
            assert_eq!(body["status"], "error");
            assert_eq!(body["statusCode"], 400);
        }

        let req = test::TestRequest::patch()
            .uri("/pomodoro/settings")
            .set_json(json!({ "work_duration": -1 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::patch()
            .uri(&format!("/pomodoro/sessions/{}", Uuid::new_v4()))
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn timer_starts_pauses_and_resets() {
        let timer = timer_with(InMemoryGateway::default());
        let app = init_app!(timer);

        let req = test::TestRequest::get().uri("/pomodoro/timer").to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["phase"], "work");
        assert_eq!(snapshot["running"], false);
        assert_eq!(snapshot["display"], "25:00");

        let req = test::TestRequest::post().uri("/pomodoro/timer/start").to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["running"], true);

        let req = test::TestRequest::post().uri("/pomodoro/timer/toggle").to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["running"], false);

        let req = test::TestRequest::post()
            .uri("/pomodoro/timer/phase")
            .set_json(json!({ "phase": "long_break" }))
            .to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["phase"], "long_break");
        assert_eq!(snapshot["remaining_seconds"], 15 * 60);

        let req = test::TestRequest::post().uri("/pomodoro/timer/reset").to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["phase"], "long_break");
        assert_eq!(snapshot["running"], false);
    }

    #[actix_web::test]
    async fn binding_a_subtask_uses_its_estimate() {
        let subtask = open_subtask(40);
        let subtask_id = subtask.id;
        let timer = timer_with(InMemoryGateway::with_subtask(subtask));
        let app = init_app!(timer);

        let req = test::TestRequest::post()
            .uri("/pomodoro/timer/subtask")
            .set_json(json!({ "subtask_id": subtask_id }))
            .to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["subtask"]["id"], subtask_id.to_string());
        assert_eq!(snapshot["remaining_seconds"], 40 * 60);
        assert_eq!(snapshot["display"], "40:00");

        let req = test::TestRequest::delete()
            .uri("/pomodoro/timer/subtask")
            .to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;
        assert!(snapshot["subtask"].is_null());
        assert_eq!(snapshot["remaining_seconds"], 25 * 60);
    }

    #[actix_web::test]
    async fn finishing_a_bound_subtask_writes_back_to_the_store() {
        let subtask = open_subtask(1);
        let subtask_id = subtask.id;
        let parent_id = subtask.task_id;
        let gateway = Arc::new(InMemoryGateway::with_subtask(subtask));
        let timer = timer_over(Arc::clone(&gateway));
        let app = init_app!(timer);

        let req = test::TestRequest::post()
            .uri("/pomodoro/timer/subtask")
            .set_json(json!({ "subtask_id": subtask_id }))
            .to_request();
        test::call_service(&app, req).await;
        let req = test::TestRequest::post().uri("/pomodoro/timer/start").to_request();
        test::call_service(&app, req).await;

        let mut writes = Vec::new();
        while timer.snapshot().running {
            if let Some(handle) = timer.tick(Utc::now()) {
                writes.push(handle);
            }
        }
        for handle in writes {
            handle.await.expect("store writes");
        }
        tokio::task::yield_now().await;

        let stored = gateway.subtask(subtask_id).expect("subtask kept");
        assert!(stored.started_at.is_some());
        assert!(stored.completed);
        assert!(stored.completed_at.is_some());

        let sessions = gateway.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].session_type, "work");
        assert_eq!(sessions[0].duration, 1);
        assert_eq!(sessions[0].task_id, parent_id);
        let completed_at = sessions[0].completed_at.expect("completion time");
        assert_eq!(completed_at - sessions[0].started_at, chrono::Duration::minutes(1));

        let req = test::TestRequest::get().uri("/pomodoro/timer").to_request();
        let snapshot: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(snapshot["phase"], "short_break");
        assert_eq!(snapshot["derived_break_minutes"], 1);
    }

    #[actix_web::test]
    async fn binding_while_running_is_a_conflict() {
        let subtask = open_subtask(10);
        let subtask_id = subtask.id;
        let timer = timer_with(InMemoryGateway::with_subtask(subtask));
        let app = init_app!(timer);

        let req = test::TestRequest::post().uri("/pomodoro/timer/start").to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::post()
            .uri("/pomodoro/timer/subtask")
            .set_json(json!({ "subtask_id": subtask_id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn binding_unknown_or_completed_subtasks_fails() {
        let mut done = open_subtask(10);
        done.completed = true;
        let done_id = done.id;
        let timer = timer_with(InMemoryGateway::with_subtask(done));
        let app = init_app!(timer);

        let req = test::TestRequest::post()
            .uri("/pomodoro/timer/subtask")
            .set_json(json!({ "subtask_id": Uuid::new_v4() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/pomodoro/timer/subtask")
            .set_json(json!({ "subtask_id": done_id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn schedule_status_uses_the_comparison_set() {
        let timer = timer_with(InMemoryGateway::default());
        let app = init_app!(timer);

        let req = test::TestRequest::get()
            .uri("/schedule/status?scheduled_time=09:00&times=09:00,11:00&now=10:30")
            .to_request();
        let status: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status["is_active"], true);
        assert_eq!(status["is_upcoming"], false);
        assert_eq!(status["display_time"], "9:00 AM");
        assert_eq!(status["now"], "10:30");

        let req = test::TestRequest::get()
            .uri("/schedule/status?scheduled_time=09:00&now=09:06")
            .to_request();
        let status: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(status["is_active"], false);

        let req = test::TestRequest::get()
            .uri("/schedule/status?scheduled_time=09:00&now=noon")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
