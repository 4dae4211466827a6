//! Coverage analysis over a project's tasks.
//!
//! Answers "where is this SEO campaign thin": task counts per
//! (pillar, phase) cell, pillars and phases with no tasks at all, and the
//! pillar to concentrate on next. The text summary goes verbatim into the
//! suggestion prompt.

use std::fmt::Write as _;

use db::models::task::{Phase, Pillar, Task, TaskStatus};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct GapCell {
    pub pillar: Pillar,
    pub phase: Phase,
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct GapReport {
    /// One cell per (pillar, phase) combination, in catalog order.
    pub cells: Vec<GapCell>,
    pub uncovered_pillars: Vec<Pillar>,
    pub uncovered_phases: Vec<Phase>,
    /// Share of (pillar, phase) cells with at least one task, 0..=100.
    pub coverage_pct: f64,
    /// The pillar with the fewest tasks; ties resolve in catalog order.
    pub suggested_focus: Pillar,
}

pub fn analyze(tasks: &[Task]) -> GapReport {
    let mut cells = Vec::with_capacity(Pillar::ALL.len() * Phase::ALL.len());
    for pillar in &Pillar::ALL {
        for phase in &Phase::ALL {
            let in_cell = tasks
                .iter()
                .filter(|t| t.pillar == *pillar && t.phase == *phase);
            let mut total = 0;
            let mut completed = 0;
            for task in in_cell {
                total += 1;
                if task.status == TaskStatus::Done {
                    completed += 1;
                }
            }
            cells.push(GapCell {
                pillar: pillar.clone(),
                phase: phase.clone(),
                total,
                completed,
            });
        }
    }

    let uncovered_pillars = Pillar::ALL
        .iter()
        .filter(|p| !tasks.iter().any(|t| t.pillar == **p))
        .cloned()
        .collect();
    let uncovered_phases = Phase::ALL
        .iter()
        .filter(|p| !tasks.iter().any(|t| t.phase == **p))
        .cloned()
        .collect();

    let covered = cells.iter().filter(|c| c.total > 0).count();
    let coverage_pct = covered as f64 / cells.len() as f64 * 100.0;

    let suggested_focus = Pillar::ALL
        .iter()
        .min_by_key(|p| tasks.iter().filter(|t| t.pillar == **p).count())
        .cloned()
        .unwrap_or(Pillar::Technical);

    GapReport {
        cells,
        uncovered_pillars,
        uncovered_phases,
        coverage_pct,
        suggested_focus,
    }
}

impl GapReport {
    /// Compact plain-text rendering for the model prompt.
    pub fn prompt_summary(&self) -> String {
        let mut out = String::from("Current coverage by pillar:\n");
        for pillar in &Pillar::ALL {
            let total: usize = self
                .cells
                .iter()
                .filter(|c| c.pillar == *pillar)
                .map(|c| c.total)
                .sum();
            let completed: usize = self
                .cells
                .iter()
                .filter(|c| c.pillar == *pillar)
                .map(|c| c.completed)
                .sum();
            if total == 0 {
                let _ = writeln!(out, "- {}: no tasks yet", pillar.label());
            } else {
                let _ = writeln!(
                    out,
                    "- {}: {} tasks, {} completed",
                    pillar.label(),
                    total,
                    completed
                );
            }
        }
        if !self.uncovered_phases.is_empty() {
            let phases: Vec<&str> = self.uncovered_phases.iter().map(|p| p.label()).collect();
            let _ = writeln!(out, "Phases with no tasks: {}", phases.join(", "));
        }
        let _ = writeln!(out, "Weakest pillar: {}", self.suggested_focus.label());
        out
    }
}
