use axum::{
    Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::{delete, get},
};
use db::models::{
    project::{CreateProject, Project, UpdateProject},
    project_member::{AddProjectMember, ProjectMember, ProjectMemberWithUser},
    task::Task,
    user::{Role, User},
};
use services::services::{
    gap_analysis::{self, GapReport},
    permissions::{self, Capability},
};
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{
    Deployment,
    error::ApiError,
    routes::{access_for, current_user, load_project},
};

/// GET /api/projects
/// Owners and admins see every project, everyone else only theirs.
pub async fn list_projects(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ViewProjects)?;

    let projects = match user.role {
        Role::Owner | Role::Admin => Project::find_all(&deployment.db().pool).await?,
        _ => Project::find_for_user(&deployment.db().pool, user.id).await?,
    };
    Ok(ResponseJson(ApiResponse::success(projects)))
}

/// POST /api/projects
pub async fn create_project(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    axum::Json(payload): axum::Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ManageProjects)?;

    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("project name must not be empty".to_string()));
    }

    let project =
        Project::create(&deployment.db().pool, &payload, Uuid::new_v4(), user.id).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

/// GET /api/projects/{project_id}
pub async fn get_project(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    Ok(ResponseJson(ApiResponse::success(project)))
}

/// PUT /api/projects/{project_id}
/// Absent fields stay untouched, explicit nulls clear.
pub async fn update_project(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let mut project = load_project(&deployment, project_id).await?;
    permissions::require_project_edit(access_for(&deployment, &user, &project).await?)?;

    payload.apply(&mut project);
    let project = Project::update(&deployment.db().pool, &project).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

/// DELETE /api/projects/{project_id}
/// Cascades to tasks, documents, members and suggestion batches.
pub async fn delete_project(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ManageProjects)?;
    let project = load_project(&deployment, project_id).await?;

    Project::delete(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

/// GET /api/projects/{project_id}/gap-analysis
/// Task coverage per pillar and phase, with the suggested focus pillar.
pub async fn get_gap_analysis(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<GapReport>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    let tasks = Task::find_by_project_id(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(gap_analysis::analyze(
        &tasks,
    ))))
}

/// GET /api/projects/{project_id}/members
pub async fn list_members(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<ProjectMemberWithUser>>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    let project = load_project(&deployment, project_id).await?;
    permissions::require_project_view(access_for(&deployment, &user, &project).await?)?;

    let members = ProjectMember::find_by_project_id(&deployment.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

/// POST /api/projects/{project_id}/members
/// Adding an existing member updates their edit flag instead.
pub async fn add_member(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(project_id): Path<Uuid>,
    axum::Json(payload): axum::Json<AddProjectMember>,
) -> Result<ResponseJson<ApiResponse<ProjectMember>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ManageMembers)?;
    let project = load_project(&deployment, project_id).await?;

    User::find_by_id(&deployment.db().pool, payload.user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let member =
        ProjectMember::add(&deployment.db().pool, Uuid::new_v4(), project.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(member)))
}

/// DELETE /api/projects/{project_id}/members/{user_id}
pub async fn remove_member(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path((project_id, member_user_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ManageMembers)?;
    let project = load_project(&deployment, project_id).await?;

    let removed = ProjectMember::remove(&deployment.db().pool, project.id, member_user_id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound("project member"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &Deployment) -> Router<Deployment> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{project_id}",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/{project_id}/gap-analysis", get(get_gap_analysis))
        .route(
            "/projects/{project_id}/members",
            get(list_members).post(add_member),
        )
        .route(
            "/projects/{project_id}/members/{user_id}",
            delete(remove_member),
        )
}
