use axum::{
    Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use db::models::{
    suggestion::{CreateSuggestionBatch, SuggestionBatch, SuggestionStatus, TaskSuggestion},
    task::Task,
};
use serde::{Deserialize, Serialize};
use services::services::{
    events::{EventKind, RemoteEvent},
    openai_api::OpenAiApiClient,
    permissions::{self, Capability},
    task_suggestion::TaskSuggestionService,
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    Deployment,
    error::ApiError,
    routes::{access_for, broadcast_badges, current_user, load_project},
};

/// Batch state as the client polls it; suggestions are parsed out of
/// their stored JSON once the batch completes.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct SuggestionBatchStatus {
    pub id: Uuid,
    pub project_id: Uuid,
    pub status: SuggestionStatus,
    pub focus: Option<String>,
    pub suggestions: Option<Vec<TaskSuggestion>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SuggestionBatch> for SuggestionBatchStatus {
    fn from(batch: SuggestionBatch) -> Self {
        let suggestions = batch.parsed_suggestions();
        Self {
            id: batch.id,
            project_id: batch.project_id,
            status: batch.status,
            focus: batch.focus,
            suggestions,
            error_message: batch.error_message,
            created_at: batch.created_at,
            updated_at: batch.updated_at,
        }
    }
}

fn suggestion_service(deployment: &Deployment) -> Result<TaskSuggestionService, ApiError> {
    let client = OpenAiApiClient::from_config(&deployment.config().openai)?;
    Ok(
        TaskSuggestionService::with_client(deployment.db().pool.clone(), client)
            .with_events(deployment.events().clone())
            .with_email(deployment.email().clone()),
    )
}

/// POST /api/projects/{project_id}/suggestions
/// Create a batch and start AI generation in the background.
pub async fn create_suggestions(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateSuggestionBatch>,
) -> Result<ResponseJson<ApiResponse<SuggestionBatchStatus>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::RequestSuggestions)?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    let service = suggestion_service(&deployment)?;
    let batch = service
        .create_and_generate(project.id, payload.focus, Some(user.email.clone()))
        .await?;

    Ok(ResponseJson(ApiResponse::success(batch.into())))
}

/// GET /api/projects/{project_id}/suggestions/latest
pub async fn latest_suggestions(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Option<SuggestionBatchStatus>>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    let mut batches = SuggestionBatch::find_by_project_id(&deployment.db().pool, project.id).await?;
    let latest = if batches.is_empty() {
        None
    } else {
        Some(SuggestionBatchStatus::from(batches.remove(0)))
    };
    Ok(ResponseJson(ApiResponse::success(latest)))
}

/// POST /api/suggestions/{batch_id}/accept
/// Turn a completed batch into real tasks and award the points.
pub async fn accept_suggestions(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(batch_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::EditTasks)?;
    let batch = SuggestionBatch::find_by_id(&deployment.db().pool, batch_id)
        .await?
        .ok_or(ApiError::NotFound("suggestion batch"))?;
    let project = load_project(&deployment, batch.project_id).await?;
    permissions::require_project_edit(access_for(&deployment, &user, &project).await?)?;

    let tasks = TaskSuggestionService::accept(&deployment.db().pool, batch.id).await?;

    for task in &tasks {
        deployment.events().publish(RemoteEvent::new(
            EventKind::TaskCreated,
            Some(project.id),
            serde_json::json!({ "task": task }),
        ));
    }
    if !tasks.is_empty() {
        let outcome = deployment
            .gamification()
            .handle_suggestions_accepted(user.id, tasks.len())
            .await?;
        broadcast_badges(&deployment, &user, &outcome).await;
    }

    let message = format!("created {} tasks from suggestions", tasks.len());
    Ok(ResponseJson(ApiResponse::success_with_message(tasks, message)))
}

pub fn router(_deployment: &Deployment) -> Router<Deployment> {
    Router::new()
        .route("/projects/{project_id}/suggestions", post(create_suggestions))
        .route(
            "/projects/{project_id}/suggestions/latest",
            get(latest_suggestions),
        )
        .route("/suggestions/{batch_id}/accept", post(accept_suggestions))
}
