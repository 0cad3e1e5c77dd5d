use crate::{
    auth::AuthenticatedUserId,
    error::AppError,
    models::{TaskInput, TaskQuery, TaskUpdate},
    state::AppState,
};
use actix_web::{delete, get, patch, post, web, HttpResponse, Responder};
use serde_json::json;
use validator::Validate;

fn task_id(path: web::Path<i64>) -> Result<i64, AppError> {
    match path.into_inner() {
        id if id >= 1 => Ok(id),
        _ => Err(AppError::BadRequest("invalid_id".into())),
    }
}

/// Lists the authenticated user's tasks.
///
/// ## Query Parameters:
/// - `page` (default 1) and `limit` (default 10, at most 100).
/// - `status` (optional): `pending`, `in-progress` or `completed`.
/// - `due_before` (optional): RFC 3339 timestamp; only tasks due strictly earlier.
///
/// ## Responses:
/// - `200 OK`: `{ "items": [Task], "page": n, "limit": n }`, newest first.
/// - `401 Unauthorized`: If the request lacks a valid session token.
#[get("")]
pub async fn get_tasks(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    query: web::Query<TaskQuery>,
) -> Result<impl Responder, AppError> {
    query.validate()?;
    let tasks = state.tasks.list(user.0, &query).await?;

    Ok(HttpResponse::Ok().json(json!({
        "items": tasks,
        "page": query.page,
        "limit": query.limit,
    })))
}

/// Creates a task owned by the authenticated user.
///
/// ## Responses:
/// - `201 Created`: the stored task.
/// - `422 Unprocessable Entity`: title empty or too long, priority outside 1..=5.
#[post("")]
pub async fn create_task(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    task_data: web::Json<TaskInput>,
) -> Result<impl Responder, AppError> {
    task_data.validate()?;
    let task = state.tasks.create(user.0, task_data.into_inner()).await?;

    Ok(HttpResponse::Created().json(&*task))
}

/// Fetches one task. Tasks owned by someone else read as not found.
#[get("/{id}")]
pub async fn get_task(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = task_id(path)?;
    let task = state
        .tasks
        .get(id, user.0)
        .await?
        .ok_or_else(|| AppError::NotFound("not_found".into()))?;

    Ok(HttpResponse::Ok().json(&*task))
}

/// Applies a partial update; absent fields keep their value.
#[patch("/{id}")]
pub async fn update_task(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    path: web::Path<i64>,
    task_data: web::Json<TaskUpdate>,
) -> Result<impl Responder, AppError> {
    let id = task_id(path)?;
    task_data.validate()?;
    let task = state
        .tasks
        .update(id, user.0, task_data.into_inner())
        .await?
        .ok_or_else(|| AppError::NotFound("not_found".into()))?;

    Ok(HttpResponse::Ok().json(task))
}

#[delete("/{id}")]
pub async fn delete_task(
    state: web::Data<AppState>,
    user: AuthenticatedUserId,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = task_id(path)?;
    if !state.tasks.delete(id, user.0).await? {
        return Err(AppError::NotFound("not_found".into()));
    }

    Ok(HttpResponse::NoContent().finish())
}
