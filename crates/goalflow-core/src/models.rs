use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of weeks every plan spans.
pub const PLAN_WEEKS: u32 = 8;

/// Length of the plan window in days (`PLAN_WEEKS` full weeks).
pub const PLAN_DAYS: i64 = PLAN_WEEKS as i64 * 7;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// How much time the user is willing to put into a goal each week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitmentLevel {
    Low,
    Medium,
    High,
}

impl CommitmentLevel {
    /// Number of tasks scheduled per week.
    pub fn tasks_per_week(self) -> u32 {
        match self {
            Self::Low => 2,
            Self::Medium => 3,
            Self::High => 5,
        }
    }

    /// Nominal length of a single work session, in minutes.
    pub fn session_minutes(self) -> u32 {
        match self {
            Self::Low => 30,
            Self::Medium => 45,
            Self::High => 60,
        }
    }
}

impl fmt::Display for CommitmentLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for CommitmentLevel {
    type Err = CommitmentLevelParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(CommitmentLevelParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`CommitmentLevel`] string.
#[derive(Debug, Clone)]
pub struct CommitmentLevelParseError(pub String);

impl fmt::Display for CommitmentLevelParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid commitment level: {:?} (expected low, medium, or high)",
            self.0
        )
    }
}

impl std::error::Error for CommitmentLevelParseError {}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

/// A goal as entered by the user, before the backend has stored it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalInput {
    pub title: String,
    pub commitment_level: CommitmentLevel,
}

impl GoalInput {
    pub fn new(title: impl Into<String>, commitment_level: CommitmentLevel) -> Self {
        Self {
            title: title.into(),
            commitment_level,
        }
    }
}

/// A goal the backend has accepted and assigned an identifier to.
///
/// Extra fields in the backend's echo are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedGoal {
    pub id: i64,
    pub title: String,
    pub commitment_level: CommitmentLevel,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// A single dated unit of work belonging to a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub goal_id: i64,
    pub title: String,
    pub description: String,
    /// Week of the plan this task falls in, `1..=PLAN_WEEKS`.
    pub week: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub completed: bool,
}

/// Request body for `POST /api/goals/{goalId}/tasks`.
///
/// `dueDate` is sent as `YYYY-MM-DD` and omitted entirely when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub goal_id: i64,
    pub title: String,
    pub description: String,
    pub week: u32,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl From<&Task> for NewTask {
    fn from(task: &Task) -> Self {
        Self {
            goal_id: task.goal_id,
            title: task.title.clone(),
            description: task.description.clone(),
            week: task.week,
            completed: task.completed,
            due_date: task.due_date,
        }
    }
}

// ---------------------------------------------------------------------------
// Plans
// ---------------------------------------------------------------------------

/// The in-memory aggregate handed to the presentation layer.
///
/// Never persisted as a unit; it is rebuilt from a goal and its tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedPlan {
    pub goal: PersistedGoal,
    pub tasks: Vec<Task>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weeks: u32,
}

impl GeneratedPlan {
    /// Assemble a plan whose window starts at `start_date` and always spans
    /// [`PLAN_WEEKS`] weeks.
    pub fn new(goal: PersistedGoal, tasks: Vec<Task>, start_date: NaiveDate) -> Self {
        Self {
            goal,
            tasks,
            start_date,
            end_date: start_date + Duration::days(PLAN_DAYS),
            weeks: PLAN_WEEKS,
        }
    }

    /// Tasks scheduled in the given week, in plan order.
    pub fn tasks_in_week(&self, week: u32) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(move |t| t.week == week)
    }
}
