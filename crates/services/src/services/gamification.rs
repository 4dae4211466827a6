//! Points, levels and badges.
//!
//! The scoring rules are pure functions so they can be tested without a
//! database; [`GamificationService`] wires them to the point ledger and the
//! badge table. `users.points` is only ever mutated through this service.

use db::models::{
    document::Document,
    gamification::{Badge, PointAward, PointReason, UserBadge},
    task::{Pillar, Task},
    user::User,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use ts_rs::TS;
use uuid::Uuid;

pub const TASK_COMPLETED_POINTS: i64 = 25;
pub const DOCUMENT_LINKED_POINTS: i64 = 10;
pub const SUGGESTION_ACCEPTED_POINTS: i64 = 5;

/// Cumulative points needed to reach each level; index 0 is level 1.
pub const LEVEL_THRESHOLDS: &[i64] = &[0, 100, 250, 500, 1000, 2000];

#[derive(Debug, Error)]
pub enum GamificationError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Everything the earning predicates look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
pub struct UserStats {
    pub completed_total: i64,
    pub completed_technical: i64,
    pub completed_on_page: i64,
    pub completed_off_page: i64,
    pub completed_analytics: i64,
    /// Tasks assigned to the user with both timeline dates set.
    pub scheduled: i64,
    pub documents_linked: i64,
}

impl UserStats {
    pub fn completed_in(&self, pillar: &Pillar) -> i64 {
        match pillar {
            Pillar::Technical => self.completed_technical,
            Pillar::OnPage => self.completed_on_page,
            Pillar::OffPage => self.completed_off_page,
            Pillar::Analytics => self.completed_analytics,
        }
    }
}

/// 1-based level for a points total.
pub fn level_for_points(points: i64) -> u32 {
    let reached = LEVEL_THRESHOLDS
        .iter()
        .take_while(|threshold| points >= **threshold)
        .count();
    reached.max(1) as u32
}

/// Points still missing for the next level, `None` at the top.
pub fn points_to_next_level(points: i64) -> Option<i64> {
    LEVEL_THRESHOLDS
        .iter()
        .find(|threshold| points < **threshold)
        .map(|threshold| threshold - points)
}

/// Display metadata for the badge catalog endpoint.
pub fn badge_title(badge: Badge) -> &'static str {
    match badge {
        Badge::FirstTask => "Getting Started",
        Badge::TaskMaster => "Task Master",
        Badge::SeoChampion => "SEO Champion",
        Badge::TechnicalExpert => "Technical Expert",
        Badge::ContentCreator => "Content Creator",
        Badge::LinkBuilder => "Link Builder",
        Badge::DataDriven => "Data Driven",
        Badge::Planner => "Planner",
    }
}

pub fn badge_description(badge: Badge) -> &'static str {
    match badge {
        Badge::FirstTask => "Complete your first task",
        Badge::TaskMaster => "Complete 10 tasks",
        Badge::SeoChampion => "Complete 25 tasks",
        Badge::TechnicalExpert => "Complete 5 technical tasks",
        Badge::ContentCreator => "Complete 5 on-page tasks",
        Badge::LinkBuilder => "Complete 5 off-page tasks",
        Badge::DataDriven => "Complete 5 analytics tasks",
        Badge::Planner => "Schedule 5 tasks with start and end dates",
    }
}

/// Whether the stats satisfy a badge's earning rule.
pub fn badge_earned(badge: Badge, stats: &UserStats) -> bool {
    match badge {
        Badge::FirstTask => stats.completed_total >= 1,
        Badge::TaskMaster => stats.completed_total >= 10,
        Badge::SeoChampion => stats.completed_total >= 25,
        Badge::TechnicalExpert => stats.completed_in(&Pillar::Technical) >= 5,
        Badge::ContentCreator => stats.completed_in(&Pillar::OnPage) >= 5,
        Badge::LinkBuilder => stats.completed_in(&Pillar::OffPage) >= 5,
        Badge::DataDriven => stats.completed_in(&Pillar::Analytics) >= 5,
        Badge::Planner => stats.scheduled >= 5,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BadgeSpec {
    pub badge: Badge,
    pub title: String,
    pub description: String,
}

pub fn badge_catalog() -> Vec<BadgeSpec> {
    Badge::ALL
        .iter()
        .map(|badge| BadgeSpec {
            badge: *badge,
            title: badge_title(*badge).to_string(),
            description: badge_description(*badge).to_string(),
        })
        .collect()
}

/// What one award changed, so callers can notify and publish events.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AwardOutcome {
    pub points_awarded: i64,
    pub total_points: i64,
    pub level: u32,
    pub new_badges: Vec<Badge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: Uuid,
    pub display_name: String,
    pub points: i64,
    pub level: u32,
}

/// Dense ranking: equal points share a rank, the next distinct total takes
/// the following rank. `users` must already be sorted by points descending.
fn dense_ranks(users: &[User]) -> Vec<LeaderboardEntry> {
    let mut entries = Vec::with_capacity(users.len());
    let mut rank = 0u32;
    let mut previous: Option<i64> = None;
    for user in users {
        if previous != Some(user.points) {
            rank += 1;
            previous = Some(user.points);
        }
        entries.push(LeaderboardEntry {
            rank,
            user_id: user.id,
            display_name: user.display_name.clone(),
            points: user.points,
            level: level_for_points(user.points),
        });
    }
    entries
}

#[derive(Clone)]
pub struct GamificationService {
    pool: SqlitePool,
}

impl GamificationService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<UserStats, GamificationError> {
        let completed_total = Task::count_completed_by_user(&self.pool, user_id).await?;
        let mut per_pillar = [0i64; 4];
        for (i, pillar) in Pillar::ALL.iter().enumerate() {
            per_pillar[i] =
                Task::count_completed_by_user_and_pillar(&self.pool, user_id, pillar).await?;
        }
        let scheduled = Task::count_scheduled_by_user(&self.pool, user_id).await?;
        let documents_linked = Document::count_linked_by_user(&self.pool, user_id).await?;
        Ok(UserStats {
            completed_total,
            completed_technical: per_pillar[0],
            completed_on_page: per_pillar[1],
            completed_off_page: per_pillar[2],
            completed_analytics: per_pillar[3],
            scheduled,
            documents_linked,
        })
    }

    /// Award badges the user now qualifies for but does not hold yet.
    pub async fn refresh_badges(&self, user_id: Uuid) -> Result<Vec<Badge>, GamificationError> {
        let stats = self.stats(user_id).await?;
        let mut newly_awarded = Vec::new();
        for badge in Badge::ALL {
            if !badge_earned(badge, &stats) {
                continue;
            }
            if UserBadge::award(&self.pool, Uuid::new_v4(), user_id, badge)
                .await?
                .is_some()
            {
                info!(user_id = %user_id, badge = %badge, "badge awarded");
                newly_awarded.push(badge);
            }
        }
        Ok(newly_awarded)
    }

    async fn grant(
        &self,
        user_id: Uuid,
        points: i64,
        reason: PointReason,
        task_id: Option<Uuid>,
    ) -> Result<AwardOutcome, GamificationError> {
        PointAward::record(&self.pool, Uuid::new_v4(), user_id, points, reason, task_id).await?;
        let user = User::add_points(&self.pool, user_id, points).await?;
        let new_badges = self.refresh_badges(user_id).await?;
        info!(
            user_id = %user_id,
            points,
            reason = %reason,
            total = user.points,
            "points awarded"
        );
        Ok(AwardOutcome {
            points_awarded: points,
            total_points: user.points,
            level: level_for_points(user.points),
            new_badges,
        })
    }

    /// Award completion points once per task; a task cycled back out of and
    /// into done does not pay twice.
    pub async fn handle_task_completed(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<AwardOutcome>, GamificationError> {
        if PointAward::exists_for_task(&self.pool, user_id, PointReason::TaskCompleted, task_id)
            .await?
        {
            return Ok(None);
        }
        let outcome = self
            .grant(
                user_id,
                TASK_COMPLETED_POINTS,
                PointReason::TaskCompleted,
                Some(task_id),
            )
            .await?;
        Ok(Some(outcome))
    }

    pub async fn handle_document_linked(
        &self,
        user_id: Uuid,
    ) -> Result<AwardOutcome, GamificationError> {
        self.grant(user_id, DOCUMENT_LINKED_POINTS, PointReason::DocumentLinked, None)
            .await
    }

    pub async fn handle_suggestions_accepted(
        &self,
        user_id: Uuid,
        accepted: usize,
    ) -> Result<AwardOutcome, GamificationError> {
        let points = SUGGESTION_ACCEPTED_POINTS * accepted as i64;
        self.grant(user_id, points, PointReason::SuggestionAccepted, None)
            .await
    }

    pub async fn leaderboard(
        &self,
        limit: i64,
    ) -> Result<Vec<LeaderboardEntry>, GamificationError> {
        let users = User::leaderboard(&self.pool, limit).await?;
        Ok(dense_ranks(&users))
    }

    pub async fn badges_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<UserBadge>, GamificationError> {
        Ok(UserBadge::find_by_user(&self.pool, user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use db::models::user::Role;

    use super::*;

    #[test]
    fn levels_follow_the_threshold_table() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(99), 1);
        assert_eq!(level_for_points(100), 2);
        assert_eq!(level_for_points(250), 3);
        assert_eq!(level_for_points(999), 4);
        assert_eq!(level_for_points(2000), 6);
        assert_eq!(level_for_points(50_000), 6);
    }

    #[test]
    fn points_to_next_level_counts_down_and_stops_at_the_top() {
        assert_eq!(points_to_next_level(0), Some(100));
        assert_eq!(points_to_next_level(90), Some(10));
        assert_eq!(points_to_next_level(100), Some(150));
        assert_eq!(points_to_next_level(2000), None);
    }

    #[test]
    fn completion_badges_trigger_at_their_counts() {
        let mut stats = UserStats::default();
        assert!(!badge_earned(Badge::FirstTask, &stats));

        stats.completed_total = 1;
        assert!(badge_earned(Badge::FirstTask, &stats));
        assert!(!badge_earned(Badge::TaskMaster, &stats));

        stats.completed_total = 10;
        assert!(badge_earned(Badge::TaskMaster, &stats));
        assert!(!badge_earned(Badge::SeoChampion, &stats));

        stats.completed_total = 25;
        assert!(badge_earned(Badge::SeoChampion, &stats));
    }

    #[test]
    fn pillar_badges_only_count_their_own_pillar() {
        let stats = UserStats {
            completed_total: 5,
            completed_technical: 5,
            ..Default::default()
        };
        assert!(badge_earned(Badge::TechnicalExpert, &stats));
        assert!(!badge_earned(Badge::ContentCreator, &stats));
        assert!(!badge_earned(Badge::LinkBuilder, &stats));
        assert_eq!(stats.completed_in(&Pillar::Technical), 5);
        assert_eq!(stats.completed_in(&Pillar::Analytics), 0);
    }

    #[test]
    fn planner_badge_watches_scheduling_not_completion() {
        let stats = UserStats {
            scheduled: 5,
            ..Default::default()
        };
        assert!(badge_earned(Badge::Planner, &stats));
        assert!(!badge_earned(Badge::FirstTask, &stats));
    }

    #[test]
    fn catalog_covers_every_badge() {
        let catalog = badge_catalog();
        assert_eq!(catalog.len(), Badge::ALL.len());
        assert!(catalog.iter().all(|spec| !spec.title.is_empty()));
        assert!(catalog.iter().all(|spec| !spec.description.is_empty()));
    }

    fn user(points: i64, name: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: format!("{name}@test.invalid"),
            display_name: name.to_string(),
            role: Role::Client,
            points,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn leaderboard_ranks_are_dense() {
        let users = vec![
            user(300, "ana"),
            user(150, "bo"),
            user(150, "cy"),
            user(40, "dee"),
        ];
        let entries = dense_ranks(&users);
        assert_eq!(
            entries.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 2, 3]
        );
        assert_eq!(entries[0].level, level_for_points(300));
    }
}
