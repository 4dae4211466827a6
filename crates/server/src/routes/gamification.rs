use axum::{
    Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{gamification::UserBadge, user::User};
use serde::{Deserialize, Serialize};
use services::services::{
    gamification::{
        BadgeSpec, LeaderboardEntry, UserStats, badge_catalog, level_for_points,
        points_to_next_level,
    },
    permissions::{self, Capability},
};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{Deployment, error::ApiError, routes::current_user};

const DEFAULT_LEADERBOARD_LIMIT: i64 = 10;
const MAX_LEADERBOARD_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

/// Points, level and completion counters for one user.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UserProgressResponse {
    pub user_id: Uuid,
    pub points: i64,
    pub level: u32,
    pub points_to_next_level: Option<i64>,
    pub stats: UserStats,
}

/// GET /api/leaderboard?limit=10
/// Users ranked by points; ties share a rank.
pub async fn leaderboard(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Query(query): Query<LeaderboardQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<LeaderboardEntry>>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ViewLeaderboard)?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);
    let entries = deployment.gamification().leaderboard(limit).await?;
    Ok(ResponseJson(ApiResponse::success(entries)))
}

/// GET /api/badges
/// Catalog of every badge with title and earning condition.
pub async fn badge_catalog_route(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
) -> Result<ResponseJson<ApiResponse<Vec<BadgeSpec>>>, ApiError> {
    current_user(&deployment, &headers).await?;
    Ok(ResponseJson(ApiResponse::success(badge_catalog())))
}

/// GET /api/users/{user_id}/badges
pub async fn user_badges(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<UserBadge>>>, ApiError> {
    let user = current_user(&deployment, &headers).await?;
    permissions::require(user.role, Capability::ViewLeaderboard)?;

    let badges = deployment.gamification().badges_for_user(user_id).await?;
    Ok(ResponseJson(ApiResponse::success(badges)))
}

/// GET /api/users/{user_id}/progress
pub async fn user_progress(
    State(deployment): State<Deployment>,
    headers: HeaderMap,
    Path(user_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<UserProgressResponse>>, ApiError> {
    let actor = current_user(&deployment, &headers).await?;
    if actor.id != user_id {
        permissions::require(actor.role, Capability::ViewLeaderboard)?;
    }

    let user = User::find_by_id(&deployment.db().pool, user_id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let stats = deployment.gamification().stats(user_id).await?;

    Ok(ResponseJson(ApiResponse::success(UserProgressResponse {
        user_id,
        points: user.points,
        level: level_for_points(user.points),
        points_to_next_level: points_to_next_level(user.points),
        stats,
    })))
}

pub fn router(_deployment: &Deployment) -> Router<Deployment> {
    Router::new()
        .route("/leaderboard", get(leaderboard))
        .route("/badges", get(badge_catalog_route))
        .route("/users/{user_id}/badges", get(user_badges))
        .route("/users/{user_id}/progress", get(user_progress))
}
