use axum::{
    Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::get,
};
use chrono::Utc;
use db::models::task::Task;
use services::services::{
    permissions,
    timeline::{self, TimelineLayout},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    Deployment,
    error::ApiError,
    routes::{access_for, current_user, load_project},
};

/// GET /api/projects/{project_id}/timeline
/// Gantt layout for the project: visible window, week buckets and one
/// row per task with percentage bar geometry.
pub async fn get_timeline(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<TimelineLayout>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    let tasks = Task::find_by_project_id(&deployment.db().pool, project.id).await?;
    let layout = timeline::layout(&tasks, Utc::now().date_naive());

    Ok(ResponseJson(ApiResponse::success(layout)))
}

pub fn router(_deployment: &Deployment) -> Router<Deployment> {
    Router::new().route("/projects/{project_id}/timeline", get(get_timeline))
}
