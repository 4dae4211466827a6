use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Closed set of badges a user can earn. Earning rules live in the
/// gamification service; this is only the stored identity.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Hash, TS, EnumString, Display,
)]
#[sqlx(type_name = "badge", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Badge {
    FirstTask,
    TaskMaster,
    SeoChampion,
    TechnicalExpert,
    ContentCreator,
    LinkBuilder,
    DataDriven,
    Planner,
}

impl Badge {
    pub const ALL: [Badge; 8] = [
        Badge::FirstTask,
        Badge::TaskMaster,
        Badge::SeoChampion,
        Badge::TechnicalExpert,
        Badge::ContentCreator,
        Badge::LinkBuilder,
        Badge::DataDriven,
        Badge::Planner,
    ];
}

/// Why points were granted.
#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display,
)]
#[sqlx(type_name = "point_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PointReason {
    TaskCompleted,
    DocumentLinked,
    SuggestionAccepted,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct UserBadge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub badge: Badge,
    pub awarded_at: DateTime<Utc>,
}

/// Append-only ledger entry; `users.points` caches the sum.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PointAward {
    pub id: Uuid,
    pub user_id: Uuid,
    pub points: i64,
    pub reason: PointReason,
    pub task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl UserBadge {
    /// Award a badge once. Returns the row when newly awarded, `None` when
    /// the user already holds it.
    pub async fn award(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
        badge: Badge,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserBadge>(
            r#"INSERT INTO user_badges (id, user_id, badge)
               VALUES ($1, $2, $3)
               ON CONFLICT (user_id, badge) DO NOTHING
               RETURNING *"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(badge)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, UserBadge>(
            "SELECT * FROM user_badges WHERE user_id = $1 ORDER BY awarded_at",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}

impl PointAward {
    pub async fn record(
        pool: &SqlitePool,
        id: Uuid,
        user_id: Uuid,
        points: i64,
        reason: PointReason,
        task_id: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PointAward>(
            r#"INSERT INTO point_awards (id, user_id, points, reason, task_id)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING *"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(points)
        .bind(reason)
        .bind(task_id)
        .fetch_one(pool)
        .await
    }

    /// Guard against double-granting the same reason for the same task, e.g.
    /// a task cycled out of and back into `done`.
    pub async fn exists_for_task(
        pool: &SqlitePool,
        user_id: Uuid,
        reason: PointReason,
        task_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM point_awards
               WHERE user_id = $1 AND reason = $2 AND task_id = $3"#,
        )
        .bind(user_id)
        .bind(reason)
        .bind(task_id)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn total_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(points), 0) FROM point_awards WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
