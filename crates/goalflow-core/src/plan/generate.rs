//! AI plan generation: the planner interface, prompt construction, and
//! validation of what the planner hands back.
//!
//! The planning service is an external collaborator. [`Planner`] is the
//! seam; [`HttpPlanner`] posts the goal and a prompt to a configured
//! endpoint and expects a JSON plan draft (or `null` for "no plan").

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::api::ApiError;
use crate::api::http::{bearer_headers, build_client, decode_json, post_json, validate_url};
use crate::models::{PLAN_WEEKS, PersistedGoal, Task};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A plan as returned by the planning service, before validation.
///
/// The service may echo the goal back; that echo is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDraft {
    #[serde(default)]
    pub tasks: Vec<TaskDraft>,
}

/// One task proposed by the planning service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub week: u32,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
}

/// Errors that end a generation attempt.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("planning service request failed: {0}")]
    Planner(#[from] ApiError),

    #[error("planning service returned no plan")]
    NoPlan,

    #[error("task {title:?} has week {week} (expected 1 to {max})", max = PLAN_WEEKS)]
    InvalidWeek { title: String, week: u32 },

    #[error("task #{index} has an empty title")]
    EmptyTitle { index: usize },

    #[error("task {title:?} has an unreadable due date {value:?}")]
    InvalidDueDate { title: String, value: String },
}

// ---------------------------------------------------------------------------
// Planner interface
// ---------------------------------------------------------------------------

/// Adapter interface for AI planning services.
///
/// Object-safe so it can be stored as `Box<dyn Planner>`.
#[async_trait]
pub trait Planner: Send + Sync {
    /// Human-readable name for this planner (e.g. "http").
    fn name(&self) -> &str;

    /// Ask the service for a plan. `Ok(None)` means the service answered but
    /// produced nothing usable.
    async fn generate(&self, goal: &PersistedGoal) -> Result<Option<PlanDraft>, ApiError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Planner) {}
};

#[async_trait]
impl<P: Planner + ?Sized> Planner for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn generate(&self, goal: &PersistedGoal) -> Result<Option<PlanDraft>, ApiError> {
        (**self).generate(goal).await
    }
}

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

/// Response schema reference included in the prompt.
const RESPONSE_SCHEMA: &str = r#"## Response Schema

Respond with a single JSON object:

```json
{
  "tasks": [
    {
      "week": 1,
      "title": "string",
      "description": "string",
      "dueDate": "YYYY-MM-DD"
    }
  ]
}
```

- `week` is REQUIRED and must be between 1 and 8.
- `title` is REQUIRED and must not be empty.
- `dueDate` is optional; omit it rather than guessing.
"#;

/// Scheduling guidelines included in the prompt.
const PLANNING_GUIDELINES: &str = r#"## Planning Guidelines

1. **Start small.** Early weeks build habits; later weeks build on them.
2. **One concrete action per task.** A task should be finishable in a single session.
3. **Respect the commitment level.** Do not exceed the weekly task count or session length.
4. **Spread tasks across the week.** Avoid stacking every task on the same day.
"#;

/// Build the prompt sent to the planning service for `goal`.
pub fn build_planning_prompt(goal: &PersistedGoal) -> String {
    let mut prompt = String::with_capacity(2048);

    prompt.push_str("# Goal Planner\n\n");
    prompt.push_str(&format!(
        "You are a planning assistant. Break the goal below into an actionable \
         {PLAN_WEEKS}-week timeline of dated tasks.\n\n"
    ));

    prompt.push_str("## Goal\n\n");
    prompt.push_str(&format!("- **Title:** {}\n", goal.title));
    prompt.push_str(&format!(
        "- **Commitment level:** {}\n",
        goal.commitment_level
    ));
    prompt.push_str(&format!(
        "- **Tasks per week:** {}\n",
        goal.commitment_level.tasks_per_week()
    ));
    prompt.push_str(&format!(
        "- **Session length:** {} minutes\n",
        goal.commitment_level.session_minutes()
    ));
    prompt.push_str(&format!("- **Duration:** {PLAN_WEEKS} weeks\n\n"));

    prompt.push_str(RESPONSE_SCHEMA);
    prompt.push('\n');
    prompt.push_str(PLANNING_GUIDELINES);

    prompt
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Parse a due date given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
///
/// Timestamps are converted to their UTC calendar date.
pub fn parse_due_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

/// Validate a draft and turn it into tasks owned by `goal`.
///
/// Task order is preserved. Every task gets a fresh identifier.
pub fn tasks_from_draft(goal: &PersistedGoal, draft: PlanDraft) -> Result<Vec<Task>, GenerateError> {
    draft
        .tasks
        .into_iter()
        .enumerate()
        .map(|(index, t)| {
            let title = t.title.trim().to_string();
            if title.is_empty() {
                return Err(GenerateError::EmptyTitle { index });
            }
            if !(1..=PLAN_WEEKS).contains(&t.week) {
                return Err(GenerateError::InvalidWeek {
                    title,
                    week: t.week,
                });
            }
            let due_date = match t.due_date.as_deref().map(str::trim) {
                None | Some("") => None,
                Some(raw) => Some(parse_due_date(raw).ok_or_else(|| {
                    GenerateError::InvalidDueDate {
                        title: title.clone(),
                        value: raw.to_string(),
                    }
                })?),
            };
            Ok(Task {
                id: Uuid::new_v4(),
                goal_id: goal.id,
                title,
                description: t.description,
                week: t.week,
                due_date,
                completed: false,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// HTTP planner
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct PlannerRequest<'a> {
    goal: &'a PersistedGoal,
    weeks: u32,
    prompt: String,
}

/// Planner that POSTs to a JSON endpoint.
#[derive(Clone)]
pub struct HttpPlanner {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPlanner")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl HttpPlanner {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, ApiError> {
        let endpoint = endpoint.into();
        validate_url(&endpoint)?;
        Ok(Self {
            endpoint,
            api_key,
            client: build_client(timeout)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Planner for HttpPlanner {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, goal), fields(goal_id = goal.id))]
    async fn generate(&self, goal: &PersistedGoal) -> Result<Option<PlanDraft>, ApiError> {
        let body = PlannerRequest {
            goal,
            weeks: PLAN_WEEKS,
            prompt: build_planning_prompt(goal),
        };
        let headers = bearer_headers(self.api_key.as_deref())?;
        let response = post_json(&self.client, &self.endpoint, &body, headers).await?;
        let draft: Option<PlanDraft> = decode_json(response, &self.endpoint).await?;
        debug!(
            tasks = draft.as_ref().map(|d| d.tasks.len()).unwrap_or(0),
            "planner responded"
        );
        Ok(draft)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
