//! Placeholder timeline synthesis, used when no planning service is involved.
//!
//! Every week gets `tasks_per_week` tasks. Each due date lands in the last
//! seven days of its week: `start + week*7 - jitter`, `jitter` in `0..=6`.
//! Jitter values inside a week are sorted so due dates never go backwards
//! across the plan.

use chrono::{Duration, NaiveDate};
use rand::Rng;
use uuid::Uuid;

use crate::models::{PLAN_WEEKS, PersistedGoal, Task};

/// Largest number of days a due date may sit before its week boundary.
pub const MAX_JITTER_DAYS: i64 = 6;

/// Title for task `task` (1-based) of `week`.
pub fn synthesized_title(goal_title: &str, week: u32, task: u32) -> String {
    format!("{goal_title} - Step {week}.{task}")
}

/// Description embedding the session length for the goal's commitment level.
pub fn synthesized_description(goal: &PersistedGoal) -> String {
    format!(
        "Work on {} for {} minutes",
        goal.title,
        goal.commitment_level.session_minutes()
    )
}

/// Generate the full eight-week task list for `goal`.
pub fn synthesize_tasks<R: Rng>(
    goal: &PersistedGoal,
    start_date: NaiveDate,
    rng: &mut R,
) -> Vec<Task> {
    let per_week = goal.commitment_level.tasks_per_week();
    let description = synthesized_description(goal);
    let mut tasks = Vec::with_capacity((PLAN_WEEKS * per_week) as usize);

    for week in 1..=PLAN_WEEKS {
        // Larger jitter means an earlier date, so sort descending.
        let mut jitters: Vec<i64> = (0..per_week)
            .map(|_| rng.random_range(0..=MAX_JITTER_DAYS))
            .collect();
        jitters.sort_unstable_by(|a, b| b.cmp(a));

        for (index, jitter) in jitters.into_iter().enumerate() {
            let offset = i64::from(week) * 7 - jitter;
            tasks.push(Task {
                id: Uuid::new_v4(),
                goal_id: goal.id,
                title: synthesized_title(&goal.title, week, index as u32 + 1),
                description: description.clone(),
                week,
                due_date: Some(start_date + Duration::days(offset)),
                completed: false,
            });
        }
    }

    tasks
}
