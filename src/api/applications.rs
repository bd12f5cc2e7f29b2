use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use crate::db::{Application, CreateApplication, UpdateApplication};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create application routes
pub fn applications_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_applications).post(create_application))
        .route(
            "/:app_id",
            get(get_application)
                .patch(update_application)
                .delete(delete_application),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

// ============================================================================
// Endpoint Handlers
// ============================================================================

/// List registered applications
async fn list_applications(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Application>>> {
    let skip = params.skip.unwrap_or(0);
    let limit = params.limit.unwrap_or(100);

    let apps: Vec<Application> =
        sqlx::query_as("SELECT * FROM applications ORDER BY name LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(skip)
            .fetch_all(&state.pool)
            .await?;

    Ok(Json(apps))
}

/// Register a new application
async fn create_application(
    State(state): State<AppState>,
    Json(req): Json<CreateApplication>,
) -> Result<(StatusCode, Json<Application>)> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest(
            "Application name cannot be empty".to_string(),
        ));
    }

    let existing: Option<Application> =
        sqlx::query_as("SELECT * FROM applications WHERE name = ?")
            .bind(name)
            .fetch_optional(&state.pool)
            .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "Application name already exists: {name}"
        )));
    }

    let now = Utc::now();
    let app: Application = sqlx::query_as(
        "INSERT INTO applications (name, repository_url, created_at, updated_at)
         VALUES (?, ?, ?, ?)
         RETURNING *",
    )
    .bind(name)
    .bind(req.repository_url.as_deref().map(str::trim))
    .bind(now)
    .bind(now)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(application_id = app.id, name = %app.name, "Application registered");
    Ok((StatusCode::CREATED, Json(app)))
}

/// Get one application
async fn get_application(
    State(state): State<AppState>,
    Path(app_id): Path<i64>,
) -> Result<Json<Application>> {
    let app = fetch_application(&state, app_id).await?;
    Ok(Json(app))
}

/// Update an application's deployment configuration. Each wizard step saves
/// only the fields it owns, so every field is optional.
async fn update_application(
    State(state): State<AppState>,
    Path(app_id): Path<i64>,
    Json(req): Json<UpdateApplication>,
) -> Result<Json<Application>> {
    fetch_application(&state, app_id).await?;

    let app: Application = sqlx::query_as(
        "UPDATE applications SET
             repository_url = COALESCE(?, repository_url),
             ci_provider = COALESCE(?, ci_provider),
             sonar_project_key = COALESCE(?, sonar_project_key),
             image_repository = COALESCE(?, image_repository),
             db_name = COALESCE(?, db_name),
             target_host = COALESCE(?, target_host),
             app_port = COALESCE(?, app_port),
             updated_at = ?
         WHERE id = ?
         RETURNING *",
    )
    .bind(req.repository_url.as_deref().map(str::trim))
    .bind(req.ci_provider.as_deref().map(str::trim))
    .bind(req.sonar_project_key.as_deref().map(str::trim))
    .bind(req.image_repository.as_deref().map(str::trim))
    .bind(req.db_name.as_deref().map(str::trim))
    .bind(req.target_host.as_deref().map(str::trim))
    .bind(req.app_port)
    .bind(Utc::now())
    .bind(app_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(app))
}

/// Delete an application. Its step records go with it.
async fn delete_application(
    State(state): State<AppState>,
    Path(app_id): Path<i64>,
) -> Result<StatusCode> {
    let result = sqlx::query("DELETE FROM applications WHERE id = ?")
        .bind(app_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Application not found: {app_id}"
        )));
    }

    tracing::info!(application_id = app_id, "Application deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_application(state: &AppState, app_id: i64) -> Result<Application> {
    sqlx::query_as::<_, Application>("SELECT * FROM applications WHERE id = ?")
        .bind(app_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Application not found: {app_id}")))
}
