//! Service for generating SEO task suggestions with OpenAI.

use db::models::{
    project::Project,
    suggestion::{SuggestionBatch, SuggestionStatus, TaskSuggestion},
    task::{CreateTask, Phase, Pillar, Task},
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{error, info, warn};
use utils::text::truncate;
use uuid::Uuid;

use super::{
    email::EmailService,
    events::{EventHub, EventKind, RemoteEvent},
    gap_analysis,
    openai_api::{OpenAiApiClient, OpenAiApiError},
};

/// Existing task names included in the prompt, at most.
const PROMPT_TASK_LIMIT: usize = 30;

#[derive(Debug, Error)]
pub enum TaskSuggestionError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("openai api error: {0}")]
    OpenAiApi(#[from] OpenAiApiError),
    #[error("project not found")]
    ProjectNotFound,
    #[error("suggestion batch not found")]
    BatchNotFound,
    #[error("batch is not completed")]
    NotCompleted,
    #[error("model returned no usable suggestions")]
    EmptyResult,
}

/// Raw model output, validated into [`TaskSuggestion`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SuggestionResponse {
    suggestions: Vec<SuggestedTaskResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SuggestedTaskResponse {
    task_name: String,
    description: Option<String>,
    pillar: String,
    phase: String,
    rationale: Option<String>,
}

/// Service for generating and accepting task suggestions
pub struct TaskSuggestionService {
    pool: SqlitePool,
    openai: OpenAiApiClient,
    events: Option<EventHub>,
    email: Option<EmailService>,
}

impl TaskSuggestionService {
    pub fn new(pool: SqlitePool) -> Result<Self, TaskSuggestionError> {
        let openai = OpenAiApiClient::from_env()?;
        Ok(Self::with_client(pool, openai))
    }

    pub fn with_client(pool: SqlitePool, openai: OpenAiApiClient) -> Self {
        Self {
            pool,
            openai,
            events: None,
            email: None,
        }
    }

    /// Publish a `SuggestionsCompleted` event when generation finishes.
    pub fn with_events(mut self, events: EventHub) -> Self {
        self.events = Some(events);
        self
    }

    /// Email the requester when generation finishes.
    pub fn with_email(mut self, email: EmailService) -> Self {
        self.email = Some(email);
        self
    }

    /// Create a batch record and start generation in the background.
    pub async fn create_and_generate(
        &self,
        project_id: Uuid,
        focus: Option<Pillar>,
        notify: Option<String>,
    ) -> Result<SuggestionBatch, TaskSuggestionError> {
        let project = Project::find_by_id(&self.pool, project_id)
            .await?
            .ok_or(TaskSuggestionError::ProjectNotFound)?;

        let id = Uuid::new_v4();
        let batch = SuggestionBatch::create(&self.pool, id, project_id, focus.as_ref()).await?;

        info!(
            batch_id = %id,
            project_id = %project_id,
            "Created suggestion batch, starting generation"
        );

        let service = TaskSuggestionService {
            pool: self.pool.clone(),
            openai: self.openai.clone(),
            events: self.events.clone(),
            email: self.email.clone(),
        };
        tokio::spawn(async move {
            if let Err(e) = service.run_generation(id, &project, focus, notify).await {
                error!(batch_id = %id, error = %e, "Suggestion generation failed");
            }
        });

        Ok(batch)
    }

    /// Walk the batch through analyzing -> completed/failed.
    async fn run_generation(
        &self,
        batch_id: Uuid,
        project: &Project,
        focus: Option<Pillar>,
        notify: Option<String>,
    ) -> Result<(), TaskSuggestionError> {
        SuggestionBatch::update_status(&self.pool, batch_id, SuggestionStatus::Analyzing, None)
            .await?;

        let tasks = Task::find_by_project_id(&self.pool, project.id).await?;
        let outcome = match self.request_suggestions(project, &tasks, focus).await {
            Ok(suggestions) if suggestions.is_empty() => Err(TaskSuggestionError::EmptyResult),
            Ok(suggestions) => Ok(suggestions),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(suggestions) => {
                SuggestionBatch::update_suggestions(&self.pool, batch_id, &suggestions).await?;
                SuggestionBatch::update_status(
                    &self.pool,
                    batch_id,
                    SuggestionStatus::Completed,
                    None,
                )
                .await?;
                info!(
                    batch_id = %batch_id,
                    count = suggestions.len(),
                    "Suggestion generation completed"
                );
                self.announce(batch_id, project, SuggestionStatus::Completed, suggestions.len());
                if let (Some(email), Some(to)) = (&self.email, &notify) {
                    email.suggestions_ready(to, &project.name, suggestions.len()).await;
                }
                Ok(())
            }
            Err(e) => {
                SuggestionBatch::update_status(
                    &self.pool,
                    batch_id,
                    SuggestionStatus::Failed,
                    Some(&e.to_string()),
                )
                .await?;
                self.announce(batch_id, project, SuggestionStatus::Failed, 0);
                Err(e)
            }
        }
    }

    fn announce(
        &self,
        batch_id: Uuid,
        project: &Project,
        status: SuggestionStatus,
        count: usize,
    ) {
        if let Some(events) = &self.events {
            events.publish(RemoteEvent::new(
                EventKind::SuggestionsCompleted,
                Some(project.id),
                serde_json::json!({
                    "batch_id": batch_id,
                    "status": status,
                    "count": count,
                }),
            ));
        }
    }

    async fn request_suggestions(
        &self,
        project: &Project,
        tasks: &[Task],
        focus: Option<Pillar>,
    ) -> Result<Vec<TaskSuggestion>, TaskSuggestionError> {
        let prompt = build_prompt(project, tasks, focus);
        let system = Some(
            "You are an experienced SEO strategist planning work for a client website. \
             Suggest concrete, actionable tasks that fill the gaps in the current plan. \
             Never repeat a task that already exists. Answer in JSON and nothing else."
                .to_string(),
        );

        let response: SuggestionResponse = self.openai.completion_json(&prompt, system).await?;

        let mut suggestions = Vec::with_capacity(response.suggestions.len());
        for raw in response.suggestions {
            let (Some(pillar), Some(phase)) = (parse_pillar(&raw.pillar), parse_phase(&raw.phase))
            else {
                warn!(
                    task_name = %raw.task_name,
                    pillar = %raw.pillar,
                    phase = %raw.phase,
                    "Dropping suggestion with unknown pillar or phase"
                );
                continue;
            };
            suggestions.push(TaskSuggestion {
                task_name: raw.task_name,
                description: raw.description,
                pillar,
                phase,
                rationale: raw.rationale,
            });
        }
        Ok(suggestions)
    }

    /// Materialize a completed batch into real tasks. Needs no API client,
    /// so it takes the pool directly.
    pub async fn accept(
        pool: &SqlitePool,
        batch_id: Uuid,
    ) -> Result<Vec<Task>, TaskSuggestionError> {
        let batch = SuggestionBatch::find_by_id(pool, batch_id)
            .await?
            .ok_or(TaskSuggestionError::BatchNotFound)?;
        if batch.status != SuggestionStatus::Completed {
            return Err(TaskSuggestionError::NotCompleted);
        }
        let suggestions = batch
            .parsed_suggestions()
            .ok_or(TaskSuggestionError::EmptyResult)?;

        let mut created = Vec::with_capacity(suggestions.len());
        for suggestion in suggestions {
            let data = CreateTask::suggested(
                batch.project_id,
                suggestion.task_name,
                suggestion.description,
                suggestion.pillar,
                suggestion.phase,
            );
            created.push(Task::create(pool, &data, Uuid::new_v4()).await?);
        }

        info!(
            batch_id = %batch_id,
            project_id = %batch.project_id,
            count = created.len(),
            "Accepted suggestion batch"
        );
        Ok(created)
    }
}

fn build_prompt(project: &Project, tasks: &[Task], focus: Option<Pillar>) -> String {
    let mut prompt = format!(
        r#"Suggest new SEO tasks for the following project.

## Project
Name: {}
"#,
        project.name
    );
    if let Some(url) = &project.website_url {
        prompt.push_str(&format!("Website: {}\n", url));
    }
    if let Some(client) = &project.client_name {
        prompt.push_str(&format!("Client: {}\n", client));
    }

    let report = gap_analysis::analyze(tasks);
    prompt.push_str(&format!("\n## Gap Analysis\n{}\n", report.prompt_summary()));

    if !tasks.is_empty() {
        prompt.push_str("\n## Existing Tasks (do not repeat these)\n");
        for task in tasks.iter().take(PROMPT_TASK_LIMIT) {
            prompt.push_str(&format!("- {}\n", truncate(&task.task_name, 80)));
        }
        if tasks.len() > PROMPT_TASK_LIMIT {
            prompt.push_str(&format!("- (and {} more)\n", tasks.len() - PROMPT_TASK_LIMIT));
        }
    }

    if let Some(focus) = &focus {
        prompt.push_str(&format!(
            "\n## Focus\nConcentrate every suggestion on the {} pillar.\n",
            focus.label()
        ));
    }

    prompt.push_str(
        r#"
## Guidelines
1. Suggest 3 to 5 tasks.
2. Classify each task into exactly one pillar:
   - "technical": crawlability, speed, indexing, structured data
   - "on_page": content, titles, internal linking
   - "off_page": backlinks, digital PR, brand mentions
   - "analytics": tracking, reporting, measurement
3. Classify each task into exactly one phase: "foundation", "growth" or "authority".
4. Prefer the pillars and phases the gap analysis calls out as weak.

## Reply format
Answer with nothing but JSON in this shape:
```json
{
  "suggestions": [
    {
      "task_name": "Short task name",
      "description": "What to do and why it helps",
      "pillar": "technical|on_page|off_page|analytics",
      "phase": "foundation|growth|authority",
      "rationale": "Why this task, given the current plan"
    }
  ]
}
```
"#,
    );
    prompt
}

/// Case and punctuation tolerant pillar parsing; the model sometimes answers
/// with display labels like "On-Page & Content".
fn parse_pillar(s: &str) -> Option<Pillar> {
    let normalized: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    match normalized.as_str() {
        "technical" => Some(Pillar::Technical),
        "onpage" | "onpagecontent" => Some(Pillar::OnPage),
        "offpage" => Some(Pillar::OffPage),
        "analytics" => Some(Pillar::Analytics),
        _ => None,
    }
}

fn parse_phase(s: &str) -> Option<Phase> {
    let normalized: String = s
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    match normalized.as_str() {
        "foundation" => Some(Phase::Foundation),
        "growth" => Some(Phase::Growth),
        "authority" => Some(Phase::Authority),
        _ => None,
    }
}
