// daily-focus-backend/src/handlers/user_handlers.rs
use crate::db::DbPool;
use crate::error_handler::ServiceError;
use crate::models::{CreateUserPayload, User};
use crate::schema::users::{self, dsl::*};
use actix_web::{get, post, web, HttpResponse};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

#[get("")]
pub async fn list_users_handler(pool: web::Data<DbPool>) -> Result<HttpResponse, ServiceError> {
    let mut conn = pool.get().await?;

    let user_list = users
        .order(created_at.desc())
        .select(User::as_select())
        .load::<User>(&mut conn)
        .await
        .map_err(ServiceError::from)?;

    Ok(HttpResponse::Ok().json(user_list))
}

#[post("")]
pub async fn create_user_handler(
    pool: web::Data<DbPool>,
    payload: web::Json<CreateUserPayload>,
) -> Result<HttpResponse, ServiceError> {
    let new_user_data = payload.into_inner().into_new_user()?;

    let mut conn = pool.get().await?;

    let user = diesel::insert_into(users::table)
        .values(&new_user_data)
        .get_result::<User>(&mut conn)
        .await
        .map_err(|e| match ServiceError::from(e) {
            ServiceError::Conflict(_) => {
                ServiceError::Conflict("Email already exists".to_string())
            }
            other => other,
        })?;

    log::info!("Created user {}", user.id);
    Ok(HttpResponse::Created().json(user))
}
