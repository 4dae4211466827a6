use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::task::{Phase, Pillar};

/// Lifecycle of a suggestion batch while the model call runs in the
/// background.
#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "suggestion_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SuggestionStatus {
    #[default]
    Pending,
    Analyzing,
    Completed,
    Failed,
}

/// One proposed task from the model.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct TaskSuggestion {
    pub task_name: String,
    pub description: Option<String>,
    pub pillar: Pillar,
    pub phase: Phase,
    pub rationale: Option<String>,
}

/// A generation request with its eventual result.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct SuggestionBatch {
    pub id: Uuid,
    pub project_id: Uuid,
    pub focus: Option<String>,
    pub status: SuggestionStatus,
    pub suggestions: Option<String>, // JSON-serialized Vec<TaskSuggestion>
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SuggestionBatch {
    /// Parse the stored suggestions JSON.
    pub fn parsed_suggestions(&self) -> Option<Vec<TaskSuggestion>> {
        self.suggestions
            .as_ref()
            .and_then(|json| serde_json::from_str(json).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateSuggestionBatch {
    /// Optional pillar to concentrate the suggestions on.
    pub focus: Option<Pillar>,
}

impl SuggestionBatch {
    pub async fn create(
        pool: &SqlitePool,
        id: Uuid,
        project_id: Uuid,
        focus: Option<&Pillar>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SuggestionBatch>(
            r#"INSERT INTO suggestion_batches (id, project_id, focus)
               VALUES ($1, $2, $3)
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(focus.map(|p| p.to_string()))
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SuggestionBatch>("SELECT * FROM suggestion_batches WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, SuggestionBatch>(
            r#"SELECT * FROM suggestion_batches
               WHERE project_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: SuggestionStatus,
        error_message: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE suggestion_batches
               SET status = $2, error_message = $3, updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(status)
        .bind(error_message)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn update_suggestions(
        pool: &SqlitePool,
        id: Uuid,
        suggestions: &[TaskSuggestion],
    ) -> Result<(), sqlx::Error> {
        let json =
            serde_json::to_string(suggestions).map_err(|e| sqlx::Error::Protocol(e.to_string()))?;
        sqlx::query(
            r#"UPDATE suggestion_batches
               SET suggestions = $2, updated_at = datetime('now', 'subsec')
               WHERE id = $1"#,
        )
        .bind(id)
        .bind(json)
        .execute(pool)
        .await?;
        Ok(())
    }
}
