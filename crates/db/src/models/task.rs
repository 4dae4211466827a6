use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// SEO work category a task belongs to.
#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "pillar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Pillar {
    Technical,
    OnPage,
    OffPage,
    Analytics,
}

impl Pillar {
    pub const ALL: [Pillar; 4] = [
        Pillar::Technical,
        Pillar::OnPage,
        Pillar::OffPage,
        Pillar::Analytics,
    ];

    /// Display label used in emails and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Pillar::Technical => "Technical",
            Pillar::OnPage => "On-Page & Content",
            Pillar::OffPage => "Off-Page",
            Pillar::Analytics => "Analytics",
        }
    }
}

/// Campaign stage a task targets.
#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "phase", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    Foundation,
    Growth,
    Authority,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Foundation, Phase::Growth, Phase::Authority];

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Foundation => "Foundation",
            Phase::Growth => "Growth",
            Phase::Authority => "Authority",
        }
    }
}

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "task_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
    Skipped,
}

/// How the task came to exist.
#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default)]
#[sqlx(type_name = "task_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskSource {
    #[default]
    Manual,
    AiSuggested,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_name: String,
    pub description: Option<String>,
    pub pillar: Pillar,
    pub phase: Phase,
    pub status: TaskStatus,
    pub source: TaskSource,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: Option<i32>, // Percent complete (0-100), display only
    pub assigned_to: Option<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// True when the task can appear on the timeline (both dates present).
    pub fn is_scheduled(&self) -> bool {
        self.start_date.is_some() && self.end_date.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub task_name: String,
    pub description: Option<String>,
    pub pillar: Pillar,
    pub phase: Phase,
    pub status: Option<TaskStatus>,
    pub source: Option<TaskSource>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: Option<i32>,
    pub assigned_to: Option<Uuid>,
}

impl CreateTask {
    pub fn new(project_id: Uuid, task_name: String, pillar: Pillar, phase: Phase) -> Self {
        Self {
            project_id,
            task_name,
            description: None,
            pillar,
            phase,
            status: Some(TaskStatus::Todo),
            source: None,
            start_date: None,
            end_date: None,
            progress: None,
            assigned_to: None,
        }
    }

    /// Task materialized from an accepted AI suggestion.
    pub fn suggested(
        project_id: Uuid,
        task_name: String,
        description: Option<String>,
        pillar: Pillar,
        phase: Phase,
    ) -> Self {
        Self {
            project_id,
            task_name,
            description,
            pillar,
            phase,
            status: Some(TaskStatus::Todo),
            source: Some(TaskSource::AiSuggested),
            start_date: None,
            end_date: None,
            progress: None,
            assigned_to: None,
        }
    }
}

/// PATCH-style update. An absent field leaves the column untouched; the
/// double-option fields distinguish absent from an explicit `null` so clients
/// can clear dates, progress and the assignee.
#[derive(Debug, Default, Serialize, Deserialize, TS)]
pub struct UpdateTask {
    pub task_name: Option<String>,
    pub pillar: Option<Pillar>,
    pub phase: Option<Phase>,
    pub status: Option<TaskStatus>,
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
    #[ts(as = "Option<NaiveDate>")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        with = "serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(as = "Option<NaiveDate>")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(
        default,
        with = "serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(as = "Option<i32>")]
    pub progress: Option<Option<i32>>,
    #[serde(
        default,
        with = "serde_with::rust::double_option",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(as = "Option<Uuid>")]
    pub assigned_to: Option<Option<Uuid>>,
}

impl UpdateTask {
    /// Merge this patch into an existing task. Pure; the caller persists the
    /// result with [`Task::update`].
    pub fn apply(&self, task: &mut Task) {
        if let Some(task_name) = &self.task_name {
            task.task_name = task_name.clone();
        }
        if let Some(pillar) = &self.pillar {
            task.pillar = pillar.clone();
        }
        if let Some(phase) = &self.phase {
            task.phase = phase.clone();
        }
        if let Some(status) = &self.status {
            task.status = status.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(start_date) = self.start_date {
            task.start_date = start_date;
        }
        if let Some(end_date) = self.end_date {
            task.end_date = end_date;
        }
        if let Some(progress) = self.progress {
            task.progress = progress;
        }
        if let Some(assigned_to) = self.assigned_to {
            task.assigned_to = assigned_to;
        }
    }
}

impl Task {
    pub async fn create(
        pool: &SqlitePool,
        data: &CreateTask,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let status = data.status.clone().unwrap_or_default();
        let source = data.source.clone().unwrap_or_default();
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks (id, project_id, task_name, description, pillar, phase, status, source, start_date, end_date, progress, assigned_to)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING *"#,
        )
        .bind(id)
        .bind(data.project_id)
        .bind(&data.task_name)
        .bind(&data.description)
        .bind(&data.pillar)
        .bind(&data.phase)
        .bind(status)
        .bind(source)
        .bind(data.start_date)
        .bind(data.end_date)
        .bind(data.progress)
        .bind(data.assigned_to)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_project_id(
        pool: &SqlitePool,
        project_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            "SELECT * FROM tasks WHERE project_id = $1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    /// Persist a merged snapshot (see [`UpdateTask::apply`]). Writes every
    /// mutable column and bumps `updated_at`.
    pub async fn update(pool: &SqlitePool, task: &Task) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET task_name = $2, description = $3, pillar = $4, phase = $5, status = $6,
                   start_date = $7, end_date = $8, progress = $9, assigned_to = $10,
                   completed_at = $11, updated_at = datetime('now', 'subsec')
               WHERE id = $1
               RETURNING *"#,
        )
        .bind(task.id)
        .bind(&task.task_name)
        .bind(&task.description)
        .bind(&task.pillar)
        .bind(&task.phase)
        .bind(&task.status)
        .bind(task.start_date)
        .bind(task.end_date)
        .bind(task.progress)
        .bind(task.assigned_to)
        .bind(task.completed_at)
        .fetch_one(pool)
        .await
    }

    /// Transition status. Entering `Done` stamps `completed_at`; leaving it
    /// clears the stamp again.
    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: TaskStatus,
    ) -> Result<Self, sqlx::Error> {
        if status == TaskStatus::Done {
            sqlx::query_as::<_, Task>(
                r#"UPDATE tasks
                   SET status = $2, completed_at = datetime('now', 'subsec'),
                       updated_at = datetime('now', 'subsec')
                   WHERE id = $1
                   RETURNING *"#,
            )
            .bind(id)
            .bind(status)
            .fetch_one(pool)
            .await
        } else {
            sqlx::query_as::<_, Task>(
                r#"UPDATE tasks
                   SET status = $2, completed_at = NULL,
                       updated_at = datetime('now', 'subsec')
                   WHERE id = $1
                   RETURNING *"#,
            )
            .bind(id)
            .bind(status)
            .fetch_one(pool)
            .await
        }
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_completed_by_user(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE assigned_to = $1 AND status = 'done'",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }

    pub async fn count_completed_by_user_and_pillar(
        pool: &SqlitePool,
        user_id: Uuid,
        pillar: &Pillar,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tasks WHERE assigned_to = $1 AND status = 'done' AND pillar = $2",
        )
        .bind(user_id)
        .bind(pillar)
        .fetch_one(pool)
        .await
    }

    /// Tasks assigned to the user that carry both timeline dates.
    pub async fn count_scheduled_by_user(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM tasks
               WHERE assigned_to = $1 AND start_date IS NOT NULL AND end_date IS NOT NULL"#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            task_name: "Fix crawl errors".to_string(),
            description: Some("404s from the old blog".to_string()),
            pillar: Pillar::Technical,
            phase: Phase::Foundation,
            status: TaskStatus::Todo,
            source: TaskSource::Manual,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 10),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 20),
            progress: Some(40),
            assigned_to: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn apply_absent_fields_leave_task_alone() {
        let mut task = base_task();
        let before = task.clone();
        UpdateTask::default().apply(&mut task);
        assert_eq!(task.task_name, before.task_name);
        assert_eq!(task.start_date, before.start_date);
        assert_eq!(task.progress, before.progress);
    }

    #[test]
    fn apply_explicit_null_clears_nullable_fields() {
        let mut task = base_task();
        let patch = UpdateTask {
            start_date: Some(None),
            end_date: Some(None),
            progress: Some(None),
            ..Default::default()
        };
        patch.apply(&mut task);
        assert!(task.start_date.is_none());
        assert!(task.end_date.is_none());
        assert!(task.progress.is_none());
    }

    #[test]
    fn apply_sets_present_fields() {
        let mut task = base_task();
        let patch = UpdateTask {
            task_name: Some("Rewrite titles".to_string()),
            pillar: Some(Pillar::OnPage),
            status: Some(TaskStatus::InProgress),
            progress: Some(Some(10)),
            ..Default::default()
        };
        patch.apply(&mut task);
        assert_eq!(task.task_name, "Rewrite titles");
        assert_eq!(task.pillar, Pillar::OnPage);
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.progress, Some(10));
    }

    #[test]
    fn update_task_json_distinguishes_absent_from_null() {
        let patch: UpdateTask = serde_json::from_str(r#"{"end_date": null}"#).unwrap();
        assert_eq!(patch.end_date, Some(None));
        assert_eq!(patch.start_date, None);

        let patch: UpdateTask = serde_json::from_str(r#"{"end_date": "2024-02-01"}"#).unwrap();
        assert_eq!(patch.end_date, Some(NaiveDate::from_ymd_opt(2024, 2, 1)));
    }

    #[test]
    fn pillar_wire_form_is_snake_case() {
        assert_eq!(
            serde_json::to_string(&Pillar::OnPage).unwrap(),
            r#""on_page""#
        );
        assert_eq!(Pillar::OffPage.to_string(), "off_page");
        assert_eq!("analytics".parse::<Pillar>().unwrap(), Pillar::Analytics);
    }

    #[test]
    fn scheduled_requires_both_dates() {
        let mut task = base_task();
        assert!(task.is_scheduled());
        task.end_date = None;
        assert!(!task.is_scheduled());
    }
}
