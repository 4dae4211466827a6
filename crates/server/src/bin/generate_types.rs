//! Writes the TypeScript bindings the web client consumes.
//!
//! Run from the workspace root: `cargo run --bin generate_types`.

use std::path::Path;

use db::models::{
    document::{CreateDocument, Document, UpdateDocument},
    gamification::{PointAward, UserBadge},
    project::{CreateProject, Project, UpdateProject},
    project_member::{AddProjectMember, ProjectMember, ProjectMemberWithUser},
    suggestion::{CreateSuggestionBatch, SuggestionBatch, TaskSuggestion},
    task::{CreateTask, Task, UpdateTask},
    user::{CreateUser, User},
};
use server::routes::{
    gamification::UserProgressResponse, suggestions::SuggestionBatchStatus,
    tasks::UpdateTaskStatusRequest, users::UpdateUserRoleRequest,
};
use services::services::{
    events::RemoteEvent,
    gamification::{AwardOutcome, BadgeSpec, LeaderboardEntry, UserStats},
    gap_analysis::GapReport,
    timeline::TimelineLayout,
};
use ts_rs::TS;
use utils::response::ApiResponse;

fn main() -> Result<(), ts_rs::ExportError> {
    let out = Path::new("shared/types");

    // Rows and payloads; enum dependencies ride along.
    Task::export_all_to(out)?;
    CreateTask::export_all_to(out)?;
    UpdateTask::export_all_to(out)?;
    Project::export_all_to(out)?;
    CreateProject::export_all_to(out)?;
    UpdateProject::export_all_to(out)?;
    ProjectMember::export_all_to(out)?;
    ProjectMemberWithUser::export_all_to(out)?;
    AddProjectMember::export_all_to(out)?;
    User::export_all_to(out)?;
    CreateUser::export_all_to(out)?;
    Document::export_all_to(out)?;
    CreateDocument::export_all_to(out)?;
    UpdateDocument::export_all_to(out)?;
    SuggestionBatch::export_all_to(out)?;
    CreateSuggestionBatch::export_all_to(out)?;
    TaskSuggestion::export_all_to(out)?;
    UserBadge::export_all_to(out)?;
    PointAward::export_all_to(out)?;

    // Service-layer shapes.
    TimelineLayout::export_all_to(out)?;
    GapReport::export_all_to(out)?;
    UserStats::export_all_to(out)?;
    AwardOutcome::export_all_to(out)?;
    LeaderboardEntry::export_all_to(out)?;
    BadgeSpec::export_all_to(out)?;
    RemoteEvent::export_all_to(out)?;

    // Request and response wrappers.
    ApiResponse::<()>::export_all_to(out)?;
    UpdateTaskStatusRequest::export_all_to(out)?;
    UpdateUserRoleRequest::export_all_to(out)?;
    SuggestionBatchStatus::export_all_to(out)?;
    UserProgressResponse::export_all_to(out)?;

    println!("TypeScript bindings written to {}", out.display());
    Ok(())
}
