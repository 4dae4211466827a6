use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

use super::user::Role;

/// Membership row linking a user to a project.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProjectMember {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    /// Client-facing edit flag kept for the UI; authorization decisions come
    /// from the role capability table, not this bit.
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
}

/// Membership joined with the user it belongs to, for member listings.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ProjectMemberWithUser {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub can_edit: bool,
    pub created_at: DateTime<Utc>,
    pub email: String,
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AddProjectMember {
    pub user_id: Uuid,
    pub can_edit: Option<bool>,
}

impl ProjectMember {
    /// Idempotent add; re-adding an existing member just refreshes the
    /// can_edit flag.
    pub async fn add(
        pool: &SqlitePool,
        id: Uuid,
        project_id: Uuid,
        data: &AddProjectMember,
    ) -> Result<Self, sqlx::Error> {
        let can_edit = data.can_edit.unwrap_or(false);
        sqlx::query_as::<_, ProjectMember>(
            r#"INSERT INTO project_members (id, project_id, user_id, can_edit)
               VALUES ($1, $2, $3, $4)
               ON CONFLICT (project_id, user_id) DO UPDATE SET can_edit = excluded.can_edit
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(data.user_id)
        .bind(can_edit)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<ProjectMemberWithUser>, sqlx::Error> {
        sqlx::query_as::<_, ProjectMemberWithUser>(
            r#"SELECT pm.id, pm.project_id, pm.user_id, pm.can_edit, pm.created_at,
                      u.email, u.display_name, u.role
               FROM project_members pm
               JOIN users u ON u.id = pm.user_id
               WHERE pm.project_id = $1
               ORDER BY u.display_name"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find(
        pool: &SqlitePool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            "SELECT * FROM project_members WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn remove(
        pool: &SqlitePool,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
                .bind(project_id)
                .bind(user_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}
