//! Gantt timeline layout for a project's tasks.
//!
//! Pure date math over `chrono::NaiveDate`: derive the visible window,
//! generate Sunday-aligned week buckets, and position each task bar as
//! percentages of the window. Nothing here touches the database, and
//! `today` is always passed in; only the [`derive_window`] convenience
//! reads the clock.

use chrono::{Datelike, Duration, NaiveDate, Utc};
use db::models::task::{Phase, Pillar, Task, TaskStatus};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Days of slack added on both sides of the scheduled task span.
pub const WINDOW_PADDING_DAYS: i64 = 7;
/// Window length when no task is scheduled yet.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;
/// Bars never render narrower than this, so one-day tasks stay clickable.
pub const MIN_BAR_WIDTH_PCT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct TimelineWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimelineWindow {
    pub fn total_days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct BarPosition {
    pub left_pct: f64,
    pub width_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
pub struct TaskBar {
    pub left_pct: f64,
    pub width_pct: f64,
    pub progress_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TimelineRow {
    pub task_id: Uuid,
    pub task_name: String,
    pub pillar: Pillar,
    pub phase: Phase,
    pub status: TaskStatus,
    /// `None` when the task has no complete date range.
    pub bar: Option<TaskBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct TimelineLayout {
    pub window: TimelineWindow,
    /// Start date of each week column, always Sundays.
    pub weeks: Vec<NaiveDate>,
    pub rows: Vec<TimelineRow>,
}

/// Derive the visible window from the scheduled tasks.
///
/// Only tasks with both dates participate; a task missing either date is
/// ignored completely. With no participating task the window defaults to
/// `[today, today + 30d]`, otherwise it spans the earliest start to the
/// latest end padded by seven days on each side.
pub fn window_from_tasks(tasks: &[Task], today: NaiveDate) -> TimelineWindow {
    let spans: Vec<(NaiveDate, NaiveDate)> = tasks
        .iter()
        .filter_map(|t| Some((t.start_date?, t.end_date?)))
        .collect();
    let min_start = spans.iter().map(|s| s.0).min();
    let max_end = spans.iter().map(|s| s.1).max();
    match (min_start, max_end) {
        (Some(min_start), Some(max_end)) => TimelineWindow {
            start: min_start - Duration::days(WINDOW_PADDING_DAYS),
            end: max_end + Duration::days(WINDOW_PADDING_DAYS),
        },
        _ => TimelineWindow {
            start: today,
            end: today + Duration::days(DEFAULT_WINDOW_DAYS),
        },
    }
}

/// [`window_from_tasks`] with the current UTC calendar date.
pub fn derive_window(tasks: &[Task]) -> TimelineWindow {
    window_from_tasks(tasks, Utc::now().date_naive())
}

/// Week column starts between `start` and `end`.
///
/// The first bucket is the Sunday on or before `start`; subsequent buckets
/// step by exactly seven days while they stay on or before `end`. The last
/// bucket may under-cover the window end by up to six days. A reversed
/// range yields no buckets.
pub fn week_buckets(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    let mut weeks = Vec::new();
    let mut current = start - Duration::days(i64::from(start.weekday().num_days_from_sunday()));
    while current <= end {
        weeks.push(current);
        current += Duration::days(7);
    }
    weeks
}

/// Position a task bar inside the window, as percentages of its span.
///
/// `left_pct` floors at 0 and `width_pct` at [`MIN_BAR_WIDTH_PCT`]; there is
/// no right-edge clamp, so a bar may run past 100%. A degenerate window
/// (zero or negative span) yields `None` rather than dividing by zero.
pub fn bar_position(
    task_start: NaiveDate,
    task_end: NaiveDate,
    window: &TimelineWindow,
) -> Option<BarPosition> {
    let total = window.total_days();
    if total <= 0 {
        return None;
    }
    let total = total as f64;
    let left_pct = ((task_start - window.start).num_days() as f64 / total * 100.0).max(0.0);
    let width_pct =
        ((task_end - task_start).num_days() as f64 / total * 100.0).max(MIN_BAR_WIDTH_PCT);
    Some(BarPosition { left_pct, width_pct })
}

/// Progress fill as a percentage of the bar's own width. Missing progress
/// counts as zero; stored values are clamped into 0..=100.
pub fn progress_overlay(progress: Option<i32>) -> f64 {
    f64::from(progress.unwrap_or(0).clamp(0, 100))
}

/// Compose the full layout for one project's tasks.
pub fn layout(tasks: &[Task], today: NaiveDate) -> TimelineLayout {
    let window = window_from_tasks(tasks, today);
    let weeks = week_buckets(window.start, window.end);
    let rows = tasks
        .iter()
        .map(|task| {
            let bar = match (task.start_date, task.end_date) {
                (Some(start), Some(end)) => {
                    bar_position(start, end, &window).map(|pos| TaskBar {
                        left_pct: pos.left_pct,
                        width_pct: pos.width_pct,
                        progress_pct: progress_overlay(task.progress),
                    })
                }
                _ => None,
            };
            TimelineRow {
                task_id: task.id,
                task_name: task.task_name.clone(),
                pillar: task.pillar.clone(),
                phase: task.phase.clone(),
                status: task.status.clone(),
                bar,
            }
        })
        .collect();
    TimelineLayout {
        window,
        weeks,
        rows,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Weekday;
    use db::models::task::TaskSource;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            task_name: "task".to_string(),
            description: None,
            pillar: Pillar::Technical,
            phase: Phase::Foundation,
            status: TaskStatus::Todo,
            source: TaskSource::Manual,
            start_date: start,
            end_date: end,
            progress: None,
            assigned_to: None,
            completed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_input_defaults_to_thirty_days_from_today() {
        let today = date(2024, 3, 6);
        let window = window_from_tasks(&[], today);
        assert_eq!(window.start, today);
        assert_eq!(window.end, date(2024, 4, 5));
        assert_eq!(window.total_days(), DEFAULT_WINDOW_DAYS);
    }

    #[test]
    fn partially_dated_tasks_do_not_stretch_the_window() {
        let today = date(2024, 3, 6);
        let tasks = vec![
            task(Some(date(2024, 3, 10)), Some(date(2024, 3, 20))),
            task(Some(date(2024, 1, 1)), None),
            task(None, Some(date(2024, 6, 30))),
        ];
        let window = window_from_tasks(&tasks, today);
        assert_eq!(window.start, date(2024, 3, 3));
        assert_eq!(window.end, date(2024, 3, 27));
    }

    #[test]
    fn only_partially_dated_tasks_fall_back_to_the_default_window() {
        let today = date(2024, 3, 6);
        let tasks = vec![task(Some(date(2024, 1, 1)), None), task(None, None)];
        let window = window_from_tasks(&tasks, today);
        assert_eq!(window.start, today);
        assert_eq!(window.end, today + Duration::days(DEFAULT_WINDOW_DAYS));
    }

    #[test]
    fn window_pads_seven_days_on_both_sides() {
        let tasks = vec![
            task(Some(date(2024, 5, 8)), Some(date(2024, 5, 10))),
            task(Some(date(2024, 5, 1)), Some(date(2024, 6, 2))),
        ];
        let window = window_from_tasks(&tasks, date(2024, 5, 1));
        assert_eq!(window.start, date(2024, 4, 24));
        assert_eq!(window.end, date(2024, 6, 9));
    }

    #[test]
    fn buckets_start_on_the_sunday_before_and_step_seven_days() {
        // 2024-03-06 is a Wednesday; the Sunday before is 2024-03-03.
        let weeks = week_buckets(date(2024, 3, 6), date(2024, 3, 27));
        assert_eq!(
            weeks,
            vec![
                date(2024, 3, 3),
                date(2024, 3, 10),
                date(2024, 3, 17),
                date(2024, 3, 24),
            ]
        );
        assert!(weeks.iter().all(|w| w.weekday() == Weekday::Sun));
        assert!(weeks.windows(2).all(|p| (p[1] - p[0]).num_days() == 7));
        assert!(*weeks.last().unwrap() <= date(2024, 3, 27));
    }

    #[test]
    fn bucket_start_on_a_sunday_is_kept_as_is() {
        let weeks = week_buckets(date(2024, 3, 3), date(2024, 3, 9));
        assert_eq!(weeks, vec![date(2024, 3, 3)]);
    }

    #[test]
    fn reversed_range_yields_no_buckets() {
        assert!(week_buckets(date(2024, 3, 10), date(2024, 3, 8)).is_empty());
    }

    #[test]
    fn bar_at_window_start_spanning_one_of_ten_days() {
        let window = TimelineWindow {
            start: date(2024, 1, 1),
            end: date(2024, 1, 11),
        };
        let pos = bar_position(date(2024, 1, 1), date(2024, 1, 2), &window).unwrap();
        assert_eq!(pos.left_pct, 0.0);
        assert_eq!(pos.width_pct, 10.0);
    }

    #[test]
    fn narrow_bars_floor_at_five_percent() {
        let window = TimelineWindow {
            start: date(2024, 1, 1),
            end: date(2024, 4, 10), // 100 days
        };
        let pos = bar_position(date(2024, 2, 1), date(2024, 2, 2), &window).unwrap();
        assert_eq!(pos.width_pct, MIN_BAR_WIDTH_PCT);

        // A reversed task span floors the same way instead of going negative.
        let pos = bar_position(date(2024, 2, 2), date(2024, 2, 1), &window).unwrap();
        assert_eq!(pos.width_pct, MIN_BAR_WIDTH_PCT);
    }

    #[test]
    fn left_never_goes_negative() {
        let window = TimelineWindow {
            start: date(2024, 1, 10),
            end: date(2024, 1, 20),
        };
        let pos = bar_position(date(2024, 1, 5), date(2024, 1, 12), &window).unwrap();
        assert_eq!(pos.left_pct, 0.0);
    }

    #[test]
    fn bars_may_overflow_the_right_edge() {
        let window = TimelineWindow {
            start: date(2024, 1, 1),
            end: date(2024, 1, 11),
        };
        let pos = bar_position(date(2024, 1, 6), date(2024, 1, 21), &window).unwrap();
        assert!(pos.left_pct + pos.width_pct > 100.0);
    }

    #[test]
    fn degenerate_window_yields_no_bar() {
        let window = TimelineWindow {
            start: date(2024, 1, 10),
            end: date(2024, 1, 10),
        };
        assert!(bar_position(date(2024, 1, 10), date(2024, 1, 11), &window).is_none());

        let reversed = TimelineWindow {
            start: date(2024, 1, 10),
            end: date(2024, 1, 5),
        };
        assert!(bar_position(date(2024, 1, 6), date(2024, 1, 7), &reversed).is_none());
    }

    #[test]
    fn progress_is_clamped_and_defaults_to_zero() {
        assert_eq!(progress_overlay(None), 0.0);
        assert_eq!(progress_overlay(Some(-5)), 0.0);
        assert_eq!(progress_overlay(Some(55)), 55.0);
        assert_eq!(progress_overlay(Some(150)), 100.0);
    }

    #[test]
    fn layout_gives_dateless_tasks_no_bar() {
        let today = date(2024, 3, 6);
        let tasks = vec![
            task(Some(date(2024, 3, 10)), Some(date(2024, 3, 20))),
            task(None, None),
        ];
        let out = layout(&tasks, today);
        assert_eq!(out.rows.len(), 2);
        assert!(out.rows[0].bar.is_some());
        assert!(out.rows[1].bar.is_none());
        assert!(!out.weeks.is_empty());
        assert_eq!(out.weeks[0].weekday(), Weekday::Sun);
    }

    #[test]
    fn layout_is_deterministic_for_identical_input() {
        let today = date(2024, 3, 6);
        let tasks = vec![
            task(Some(date(2024, 3, 10)), Some(date(2024, 3, 20))),
            task(Some(date(2024, 2, 1)), Some(date(2024, 2, 3))),
            task(None, Some(date(2024, 6, 1))),
        ];
        assert_eq!(layout(&tasks, today), layout(&tasks, today));
    }
}
