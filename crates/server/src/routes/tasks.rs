use axum::{
    Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    task::{CreateTask, Task, TaskStatus, UpdateTask},
    user::User,
};
use serde::{Deserialize, Serialize};
use services::services::{
    events::{EventKind, RemoteEvent},
    permissions::{self, Capability},
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    Deployment,
    error::ApiError,
    routes::{access_for, broadcast_badges, current_user, load_project},
};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateTaskStatusRequest {
    pub status: TaskStatus,
}

/// GET /api/projects/{project_id}/tasks
pub async fn list_tasks(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    let tasks = Task::find_by_project_id(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

/// POST /api/projects/{project_id}/tasks
pub async fn create_task(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
    axum::Json(mut payload): axum::Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::EditTasks)?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_edit(access_for(&deployment, &user, &project).await?)?;

    if payload.task_name.trim().is_empty() {
        return Err(ApiError::BadRequest("task name must not be empty".to_string()));
    }
    payload.project_id = project.id;

    let task = Task::create(&deployment.db().pool, &payload, Uuid::new_v4()).await?;

    deployment.events().publish(RemoteEvent::new(
        EventKind::TaskCreated,
        Some(project.id),
        serde_json::json!({ "task": task }),
    ));
    notify_assignee(&deployment, &task, None, &project.name).await?;

    Ok(ResponseJson(ApiResponse::success(task)))
}

/// GET /api/tasks/{task_id}
pub async fn get_task(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let task = load_task(&deployment, task_id).await?;
    let project = load_project(&deployment, task.project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    Ok(ResponseJson(ApiResponse::success(task)))
}

/// PUT /api/tasks/{task_id}
/// Absent fields stay untouched, explicit nulls clear the column.
pub async fn update_task(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let mut task = load_task(&deployment, task_id).await?;
    let project = load_project(&deployment, task.project_id).await?;
    permissions::require(user.role, Capability::EditTasks)?;
    permissions::require_project_edit(access_for(&deployment, &user, &project).await?)?;

    let previous_status = task.status.clone();
    let previous_assignee = task.assigned_to;

    payload.apply(&mut task);
    let mut task = Task::update(&deployment.db().pool, &task).await?;
    if task.status != previous_status {
        // completed_at is owned by the status transition
        task = Task::update_status(&deployment.db().pool, task.id, task.status.clone()).await?;
    }

    deployment.events().publish(RemoteEvent::new(
        EventKind::TaskUpdated,
        Some(project.id),
        serde_json::json!({ "task": task }),
    ));
    notify_assignee(&deployment, &task, previous_assignee, &project.name).await?;
    completion_side_effects(&deployment, &user, &previous_status, &task).await?;

    Ok(ResponseJson(ApiResponse::success(task)))
}

/// POST /api/tasks/{task_id}/status
/// Moving into done stamps completed_at and awards points once per task.
pub async fn update_task_status(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateTaskStatusRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let task = load_task(&deployment, task_id).await?;
    let project = load_project(&deployment, task.project_id).await?;
    permissions::require(user.role, Capability::EditTasks)?;
    permissions::require_project_edit(access_for(&deployment, &user, &project).await?)?;

    let previous_status = task.status.clone();
    let task = Task::update_status(&deployment.db().pool, task.id, payload.status).await?;

    deployment.events().publish(RemoteEvent::new(
        EventKind::TaskUpdated,
        Some(project.id),
        serde_json::json!({ "task": task }),
    ));
    completion_side_effects(&deployment, &user, &previous_status, &task).await?;

    Ok(ResponseJson(ApiResponse::success(task)))
}

/// DELETE /api/tasks/{task_id}
pub async fn delete_task(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(task_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let task = load_task(&deployment, task_id).await?;
    let project = load_project(&deployment, task.project_id).await?;
    permissions::require(user.role, Capability::EditTasks)?;
    permissions::require_project_edit(access_for(&deployment, &user, &project).await?)?;

    Task::delete(&deployment.db().pool, task.id).await?;

    deployment.events().publish(RemoteEvent::new(
        EventKind::TaskDeleted,
        Some(project.id),
        serde_json::json!({ "task_id": task.id }),
    ));

    Ok(ResponseJson(ApiResponse::success(())))
}

async fn load_task(deployment: &Deployment, task_id: Uuid) -> Result<Task, ApiError> {
    Task::find_by_id(&deployment.db().pool, task_id)
        .await?
        .ok_or(ApiError::NotFound("task"))
}

/// Email a newly assigned user.
async fn notify_assignee(
    deployment: &Deployment,
    task: &Task,
    previous_assignee: Option<Uuid>,
    project_name: &str,
) -> Result<(), ApiError> {
    let Some(assignee_id) = task.assigned_to else {
        return Ok(());
    };
    if previous_assignee == Some(assignee_id) {
        return Ok(());
    }
    if let Some(assignee) = User::find_by_id(&deployment.db().pool, assignee_id).await? {
        deployment
            .email()
            .task_assigned(&assignee.email, &task.task_name, project_name)
            .await;
    }
    Ok(())
}

/// Points, badges and owner notification for a transition into done.
async fn completion_side_effects(
    deployment: &Deployment,
    user: &User,
    previous_status: &TaskStatus,
    task: &Task,
) -> Result<(), ApiError> {
    if task.status != TaskStatus::Done || *previous_status == TaskStatus::Done {
        return Ok(());
    }

    if let Some(outcome) = deployment
        .gamification()
        .handle_task_completed(user.id, task.id)
        .await?
    {
        broadcast_badges(deployment, user, &outcome).await;
    }

    let project = load_project(deployment, task.project_id).await?;
    if project.owner_id != user.id {
        if let Some(owner) = User::find_by_id(&deployment.db().pool, project.owner_id).await? {
            deployment
                .email()
                .task_completed(&owner.email, &task.task_name, &user.display_name)
                .await;
        }
    }

    Ok(())
}

pub fn router(_deployment: &Deployment) -> Router<Deployment> {
    Router::new()
        .route(
            "/projects/{project_id}/tasks",
            get(list_tasks).post(create_task),
        )
        .route(
            "/tasks/{task_id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/{task_id}/status", post(update_task_status))
}
