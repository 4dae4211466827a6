pub mod documents;
pub mod events;
pub mod gamification;
pub mod health;
pub mod projects;
pub mod suggestions;
pub mod tasks;
pub mod timeline;
pub mod users;

use axum::{Router, http::HeaderMap};
use db::models::{project::Project, project_member::ProjectMember, user::User};
use services::services::{
    gamification::{AwardOutcome, badge_title},
    permissions::{self, ProjectAccess},
};
use uuid::Uuid;

use crate::{Deployment, error::ApiError};

/// Header carrying the acting user's id. Authentication proper happens
/// upstream; this server only resolves and authorizes the identity.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn router(deployment: &Deployment) -> Router<Deployment> {
    let api = Router::new()
        .merge(health::router())
        .merge(projects::router(deployment))
        .merge(tasks::router(deployment))
        .merge(timeline::router(deployment))
        .merge(documents::router(deployment))
        .merge(users::router(deployment))
        .merge(gamification::router(deployment))
        .merge(suggestions::router(deployment))
        .merge(events::router(deployment));

    Router::new().nest("/api", api)
}

/// Resolve the acting user from the `X-User-Id` header.
pub(crate) async fn current_user(
    deployment: &Deployment,
    headers: &HeaderMap,
) -> Result<User, ApiError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;
    let id = Uuid::parse_str(raw).map_err(|_| ApiError::Unauthorized)?;
    User::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(ApiError::Unauthorized)
}

pub(crate) async fn load_project(
    deployment: &Deployment,
    project_id: Uuid,
) -> Result<Project, ApiError> {
    Project::find_by_id(&deployment.db().pool, project_id)
        .await?
        .ok_or(ApiError::NotFound("project"))
}

/// Compute the user's access level for a project from role, ownership
/// and membership.
pub(crate) async fn access_for(
    deployment: &Deployment,
    user: &User,
    project: &Project,
) -> Result<ProjectAccess, ApiError> {
    let membership = ProjectMember::find(&deployment.db().pool, project.id, user.id).await?;
    Ok(permissions::project_access(
        user.role,
        project.owner_id == user.id,
        membership.as_ref(),
    ))
}

/// Fan out badge notifications after a point award.
pub(crate) async fn broadcast_badges(
    deployment: &Deployment,
    user: &User,
    outcome: &AwardOutcome,
) {
    use services::services::events::{EventKind, RemoteEvent};

    for badge in &outcome.new_badges {
        deployment.events().publish(RemoteEvent::new(
            EventKind::BadgeAwarded,
            None,
            serde_json::json!({
                "user_id": user.id,
                "badge": badge,
                "level": outcome.level,
                "total_points": outcome.total_points,
            }),
        ));
        deployment
            .email()
            .badge_awarded(&user.email, badge_title(*badge))
            .await;
    }
}
