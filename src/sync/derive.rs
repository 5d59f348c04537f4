//! Derived views over the mirrored hierarchy.
//!
//! Every function here is a pure read of a [`Mirror`]: safe to call on any
//! update tick, recomputed from the full mirrored state rather than patched
//! incrementally, and never issuing a write. Persisting a derived value
//! (e.g. goal progress) is an explicit repository operation.

use chrono::NaiveDate;

use super::Mirror;
use crate::models::{PriorityTier, Task};

/// Completion percentage for a goal.
///
/// Recomputed as `round(100 * completed / total)` over the goal's mirrored
/// tasks whenever any are present. When no task data is mirrored (not yet
/// loaded, or the goal genuinely has none) the stored `progress` field is
/// returned instead, so a goal never reads as 0% just because its tasks
/// have not arrived. Returns `None` for unknown goals.
pub fn goal_progress(mirror: &Mirror, goal_id: &str) -> Option<u8> {
    let goal = mirror.goal(goal_id)?;

    let mut total = 0u32;
    let mut completed = 0u32;
    for task in mirror.tasks_for_goal(goal_id) {
        total += 1;
        if task.completed {
            completed += 1;
        }
    }

    if total == 0 {
        return Some(goal.progress);
    }
    Some(((100.0 * f64::from(completed) / f64::from(total)).round()) as u8)
}

/// All tasks across all goals scheduled for `date`, in data order.
pub fn todays_tasks<'a>(mirror: &'a Mirror, date: NaiveDate) -> Vec<&'a Task> {
    mirror.all_tasks().filter(|task| task.date == date).collect()
}

/// Priority tier for a task, when its three inputs are present.
///
/// score = simplicity * urgency * importance; High at >= 75, Medium at
/// >= 50, Low otherwise.
pub fn task_priority(task: &Task) -> Option<PriorityTier> {
    task.priority()
}

/// Pending (incomplete) tasks ranked High -> Medium -> Low, data order
/// within a tier. Tasks without priority inputs sort after Low.
pub fn ranked_tasks(mirror: &Mirror) -> Vec<&Task> {
    let mut tasks: Vec<&Task> = mirror.all_tasks().filter(|t| !t.completed).collect();
    tasks.sort_by_key(|task| match task_priority(task) {
        Some(PriorityTier::High) => 0u8,
        Some(PriorityTier::Medium) => 1,
        Some(PriorityTier::Low) => 2,
        None => 3,
    });
    tasks
}
