//! Plan materialization: turn a persisted goal into a dated task timeline.
//!
//! Two interchangeable strategies implement [`PlanStrategy`]:
//! - [`SynthesizedStrategy`] builds a placeholder schedule locally and keeps
//!   it in memory only.
//! - [`AiStrategy`] asks a [`Planner`] for the timeline, then saves every
//!   task to the backend concurrently. Individual save failures are logged
//!   and reported in a [`PersistReport`]; they never fail the plan.
//!
//! Exactly one strategy is chosen at startup. An AI failure is never
//! papered over with a synthesized plan.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use futures::future::join_all;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::api::GoalApi;
use crate::models::{GeneratedPlan, NewTask, PersistedGoal, Task};

use super::generate::{GenerateError, Planner, tasks_from_draft};
use super::synthesize::synthesize_tasks;

// ---------------------------------------------------------------------------
// Strategy selection
// ---------------------------------------------------------------------------

/// Which materialization strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Synthesized,
    Ai,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Synthesized => "synthesized",
            Self::Ai => "ai",
        };
        f.write_str(s)
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synthesized" => Ok(Self::Synthesized),
            "ai" => Ok(Self::Ai),
            other => Err(StrategyKindParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`StrategyKind`] string.
#[derive(Debug, Clone)]
pub struct StrategyKindParseError(pub String);

impl fmt::Display for StrategyKindParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid strategy: {:?} (expected synthesized or ai)",
            self.0
        )
    }
}

impl std::error::Error for StrategyKindParseError {}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of saving a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskOutcome {
    pub task_id: Uuid,
    pub title: String,
    /// `None` when the save succeeded, otherwise the error message.
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-task results of a persistence fan-out, in plan order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistReport {
    pub outcomes: Vec<TaskOutcome>,
}

impl PersistReport {
    /// Number of save attempts made.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }

    /// Outcomes of the saves that failed.
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// A materialized plan, plus the persistence report when tasks were saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Materialized {
    pub plan: GeneratedPlan,
    pub persistence: Option<PersistReport>,
}

// ---------------------------------------------------------------------------
// Strategy interface
// ---------------------------------------------------------------------------

/// Interface shared by the materialization strategies.
#[async_trait]
pub trait PlanStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Produce a plan for an already-persisted goal.
    async fn materialize(&self, goal: &PersistedGoal) -> Result<Materialized, GenerateError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn PlanStrategy) {}
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ---------------------------------------------------------------------------
// Synthesized strategy
// ---------------------------------------------------------------------------

/// Builds a placeholder schedule without any external call.
#[derive(Debug, Clone, Default)]
pub struct SynthesizedStrategy {
    seed: Option<u64>,
    start_date: Option<NaiveDate>,
}

impl SynthesizedStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed RNG seed so due-date jitter is reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Pin the plan start instead of using today's date.
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }

    fn tasks_for(&self, goal: &PersistedGoal, start: NaiveDate) -> Vec<Task> {
        match self.seed {
            Some(seed) => synthesize_tasks(goal, start, &mut StdRng::seed_from_u64(seed)),
            None => synthesize_tasks(goal, start, &mut rand::rng()),
        }
    }
}

#[async_trait]
impl PlanStrategy for SynthesizedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Synthesized
    }

    #[instrument(skip(self, goal), fields(goal_id = goal.id))]
    async fn materialize(&self, goal: &PersistedGoal) -> Result<Materialized, GenerateError> {
        let start = self.start_date.unwrap_or_else(today);
        let tasks = self.tasks_for(goal, start);
        info!(tasks = tasks.len(), "synthesized plan");

        Ok(Materialized {
            plan: GeneratedPlan::new(goal.clone(), tasks, start),
            persistence: None,
        })
    }
}

// ---------------------------------------------------------------------------
// AI strategy
// ---------------------------------------------------------------------------

/// Asks a planning service for the timeline and saves each task.
pub struct AiStrategy<P> {
    planner: P,
    api: Arc<dyn GoalApi>,
    start_date: Option<NaiveDate>,
}

impl<P: Planner> fmt::Debug for AiStrategy<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiStrategy")
            .field("planner", &self.planner.name())
            .field("start_date", &self.start_date)
            .finish()
    }
}

impl<P: Planner> AiStrategy<P> {
    pub fn new(planner: P, api: Arc<dyn GoalApi>) -> Self {
        Self {
            planner,
            api,
            start_date: None,
        }
    }

    /// Pin the plan start instead of using today's date.
    pub fn with_start_date(mut self, start_date: NaiveDate) -> Self {
        self.start_date = Some(start_date);
        self
    }
}

#[async_trait]
impl<P: Planner> PlanStrategy for AiStrategy<P> {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Ai
    }

    #[instrument(skip(self, goal), fields(goal_id = goal.id))]
    async fn materialize(&self, goal: &PersistedGoal) -> Result<Materialized, GenerateError> {
        let draft = match self.planner.generate(goal).await {
            Ok(Some(draft)) => draft,
            Ok(None) => {
                warn!("planner returned no plan");
                return Err(GenerateError::NoPlan);
            }
            Err(e) => {
                warn!(error = %e, "planner request failed");
                return Err(e.into());
            }
        };

        let tasks = tasks_from_draft(goal, draft)?;
        info!(tasks = tasks.len(), "planner produced plan");

        let report = persist_tasks(self.api.as_ref(), goal.id, &tasks).await;
        if report.failed() > 0 {
            warn!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                "some tasks were not saved"
            );
        }

        let start = self.start_date.unwrap_or_else(today);
        Ok(Materialized {
            plan: GeneratedPlan::new(goal.clone(), tasks, start),
            persistence: Some(report),
        })
    }
}

// ---------------------------------------------------------------------------
// Persistence fan-out
// ---------------------------------------------------------------------------

/// Save every task under `goal_id` concurrently and wait for all of them.
///
/// A failed save is logged and recorded; it does not cancel or fail its
/// siblings. With no tasks, no request is made.
pub async fn persist_tasks(api: &dyn GoalApi, goal_id: i64, tasks: &[Task]) -> PersistReport {
    let saves = tasks.iter().map(|task| async move {
        let body = NewTask::from(task);
        let error = match api.create_task(goal_id, &body).await {
            Ok(()) => None,
            Err(e) => {
                warn!(goal_id, task = %task.title, error = %e, "failed to save task");
                Some(e.to_string())
            }
        };
        TaskOutcome {
            task_id: task.id,
            title: task.title.clone(),
            error,
        }
    });

    PersistReport {
        outcomes: join_all(saves).await,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
