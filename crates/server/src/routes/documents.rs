use axum::{
    Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    document::{CreateDocument, Document, UpdateDocument},
    task::Task,
};
use services::services::{
    events::{EventKind, RemoteEvent},
    permissions::{self, Capability},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    Deployment,
    error::ApiError,
    routes::{access_for, broadcast_badges, current_user, load_project},
};

/// GET /api/projects/{project_id}/documents
pub async fn list_documents(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Document>>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    let documents = Document::find_by_project_id(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(documents)))
}

/// POST /api/projects/{project_id}/documents
/// Linking the document to a task awards points to the uploader.
pub async fn create_document(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<CreateDocument>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ManageDocuments)?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_edit(access_for(&deployment, &user, &project).await?)?;

    if payload.url.trim().is_empty() {
        return Err(ApiError::BadRequest("document url must not be empty".to_string()));
    }
    if let Some(task_id) = payload.task_id {
        let task = Task::find_by_id(&deployment.db().pool, task_id)
            .await?
            .ok_or(ApiError::NotFound("task"))?;
        if task.project_id != project.id {
            return Err(ApiError::BadRequest(
                "task belongs to a different project".to_string(),
            ));
        }
    }

    let document = Document::create(
        &deployment.db().pool,
        &payload,
        Uuid::new_v4(),
        project.id,
        Some(user.id),
    )
    .await?;

    deployment.events().publish(RemoteEvent::new(
        EventKind::DocumentAdded,
        Some(project.id),
        serde_json::json!({ "document": document }),
    ));
    if document.task_id.is_some() {
        let outcome = deployment.gamification().handle_document_linked(user.id).await?;
        broadcast_badges(&deployment, &user, &outcome).await;
    }

    Ok(ResponseJson(ApiResponse::success(document)))
}

/// GET /api/documents/{document_id}
pub async fn get_document(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(document_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let document = load_document(&deployment, document_id).await?;
    let project = load_project(&deployment, document.project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    Ok(ResponseJson(ApiResponse::success(document)))
}

/// PUT /api/documents/{document_id}
/// A task link added here awards the linking points as well.
pub async fn update_document(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(document_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateDocument>,
) -> Result<ResponseJson<ApiResponse<Document>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ManageDocuments)?;
    let mut document = load_document(&deployment, document_id).await?;
    let project = load_project(&deployment, document.project_id).await?;
    permissions::require_project_edit(access_for(&deployment, &user, &project).await?)?;

    let was_linked = document.task_id.is_some();
    payload.apply(&mut document);
    if let Some(task_id) = document.task_id {
        let task = Task::find_by_id(&deployment.db().pool, task_id)
            .await?
            .ok_or(ApiError::NotFound("task"))?;
        if task.project_id != project.id {
            return Err(ApiError::BadRequest(
                "task belongs to a different project".to_string(),
            ));
        }
    }
    let document = Document::update(&deployment.db().pool, &document).await?;

    if !was_linked && document.task_id.is_some() {
        let outcome = deployment.gamification().handle_document_linked(user.id).await?;
        broadcast_badges(&deployment, &user, &outcome).await;
    }

    Ok(ResponseJson(ApiResponse::success(document)))
}

/// DELETE /api/documents/{document_id}
pub async fn delete_document(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(document_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ManageDocuments)?;
    let document = load_document(&deployment, document_id).await?;
    let project = load_project(&deployment, document.project_id).await?;
    permissions::require_project_edit(access_for(&deployment, &user, &project).await?)?;

    Document::delete(&deployment.db().pool, document.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

async fn load_document(deployment: &Deployment, document_id: Uuid) -> Result<Document, ApiError> {
    Document::find_by_id(&deployment.db().pool, document_id)
        .await?
        .ok_or(ApiError::NotFound("document"))
}

pub fn router(_deployment: &Deployment) -> Router<Deployment> {
    Router::new()
        .route(
            "/projects/{project_id}/documents",
            get(list_documents).post(create_document),
        )
        .route(
            "/documents/{document_id}",
            get(get_document).put(update_document).delete(delete_document),
        )
}
