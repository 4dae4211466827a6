use axum::{
    Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::{get, put},
};
use db::models::user::{CreateUser, Role, User};
use serde::{Deserialize, Serialize};
use services::services::permissions::{self, Capability};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{Deployment, error::ApiError, routes::current_user};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateUserRoleRequest {
    pub role: Role,
}

/// GET /api/users
pub async fn list_users(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ManageUsers)?;

    let users = User::find_all(&deployment.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(users)))
}

/// POST /api/users
/// The very first account bootstraps the workspace and becomes its owner;
/// after that only owners and admins may create users.
pub async fn create_user(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    axum::Json(mut payload): axum::Json<CreateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let pool = &deployment.db().pool;

    if User::count(pool).await? == 0 {
        payload.role = Some(Role::Owner);
    } else {
        let actor = current_user(&deployment, &headers).await?;
        permissions::require(actor.role, Capability::ManageUsers)?;
    }

    if !payload.email.contains('@') {
        return Err(ApiError::BadRequest("invalid email address".to_string()));
    }
    if User::find_by_email(pool, &payload.email).await?.is_some() {
        return Err(ApiError::BadRequest("email already registered".to_string()));
    }

    let user = User::create(pool, &payload, Uuid::new_v4()).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// GET /api/users/me
pub async fn me(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// GET /api/users/{user_id}
pub async fn get_user(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let actor = current_user(&deployment, &headers).await?;
    if actor.id != user_id {
        permissions::require(actor.role, Capability::ManageUsers)?;
    }

    let user = User::find_by_id(&deployment.db().pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// PUT /api/users/{user_id}/role
pub async fn update_user_role(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
    axum::Json(payload): axum::Json<UpdateUserRoleRequest>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let actor = current_user(&deployment, &headers).await?;
    permissions::require(actor.role, Capability::ManageUsers)?;

    if actor.id == user_id {
        return Err(ApiError::BadRequest("cannot change your own role".to_string()));
    }
    User::find_by_id(&deployment.db().pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    let user = User::update_role(&deployment.db().pool, user_id, payload.role).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// DELETE /api/users/{user_id}
pub async fn delete_user(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let actor = current_user(&deployment, &headers).await?;
    permissions::require(actor.role, Capability::ManageUsers)?;

    if actor.id == user_id {
        return Err(ApiError::BadRequest("cannot delete your own account".to_string()));
    }

    let removed = User::delete(&deployment.db().pool, user_id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound("user"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(_deployment: &Deployment) -> Router<Deployment> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/me", get(me))
        .route(
            "/users/{user_id}",
            get(get_user).delete(delete_user),
        )
        .route("/users/{user_id}/role", put(update_user_role))
}
