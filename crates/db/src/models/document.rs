use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "document_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Link,
    Report,
    Spreadsheet,
    Brief,
}

/// Deliverable attached to a project. Stores metadata and a URL only; the
/// bytes live wherever the URL points.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Document {
    pub id: Uuid,
    pub project_id: Uuid,
    pub title: String,
    pub url: String,
    pub kind: DocumentKind,
    pub description: Option<String>,
    pub task_id: Option<Uuid>, // Optional link to the task it evidences
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateDocument {
    pub title: String,
    pub url: String,
    pub kind: Option<DocumentKind>,
    pub description: Option<String>,
    pub task_id: Option<Uuid>,
}

#[derive(Debug, Default, Serialize, Deserialize, TS)]
pub struct UpdateDocument {
    pub title: Option<String>,
    pub url: Option<String>,
    pub kind: Option<DocumentKind>,
    #[serde(
        default,
        with = "serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(as = "Option<String>")]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        with = "serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(as = "Option<Uuid>")]
    pub task_id: Option<Option<Uuid>>,
}

impl UpdateDocument {
    pub fn apply(&self, document: &mut Document) {
        if let Some(title) = &self.title {
            document.title = title.clone();
        }
        if let Some(url) = &self.url {
            document.url = url.clone();
        }
        if let Some(kind) = &self.kind {
            document.kind = kind.clone();
        }
        if let Some(description) = &self.description {
            document.description = description.clone();
        }
        if let Some(task_id) = self.task_id {
            document.task_id = task_id;
        }
    }
}

impl Document {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateDocument,
        id: Uuid,
        project_id: Uuid,
        uploaded_by: Option<Uuid>,
    ) -> Result<Self, sqlx::Error> {
        let kind = data.kind.clone().unwrap_or_default();
        sqlx::query_as::<_, Document>(
            r#"INSERT INTO documents (id, project_id, title, url, kind, description, task_id, uploaded_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING *"#,
        )
        .bind(id)
        .bind(project_id)
        .bind(&data.title)
        .bind(&data.url)
        .bind(kind)
        .bind(&data.description)
        .bind(data.task_id)
        .bind(uploaded_by)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Document>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Document>(
            "SELECT * FROM documents WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn update(pool: &SqlitePool, document: &Document) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Document>(
            r#"UPDATE documents
               SET title = $2, url = $3, kind = $4, description = $5, task_id = $6,
                   updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(document.id)
        .bind(&document.title)
        .bind(&document.url)
        .bind(&document.kind)
        .bind(&document.description)
        .bind(document.task_id)
        .fetch_one(pool)
        .await
    }

    pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_linked_by_user(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM documents WHERE uploaded_by = $1 AND task_id IS NOT NULL",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
