//! Client-side plan session: the state a front end shows, and the flow that
//! fills it.
//!
//! [`PlanSession::submit`] creates the goal, then materializes it with the
//! configured strategy. Only one submission runs at a time, from goal
//! creation until the plan is applied. [`PlanSession::reset`] clears
//! everything. Requests
//! already in flight when `reset` runs are not cancelled; whatever they
//! return afterwards is dropped instead of being applied.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::GoalApi;
use crate::models::{GeneratedPlan, GoalInput, PersistedGoal};
use crate::plan::{GenerateError, Materialized, PersistReport, PlanStrategy, StrategyKind};
use crate::submit::{GoalSubmitter, ProcessingGuard, SubmitError};

/// Title of the single user-facing notification for a failed submission.
pub const ERROR_TITLE: &str = "Error generating plan";

/// Description used when an error has nothing better to say.
pub const FALLBACK_DESCRIPTION: &str = "Please try again";

/// Any failure that ends a submission.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Submission(#[from] SubmitError),

    #[error(transparent)]
    Generation(#[from] GenerateError),
}

impl FlowError {
    /// Convert into the one notification the user sees.
    pub fn notification(&self) -> Notification {
        let description = self.to_string();
        Notification {
            title: ERROR_TITLE,
            description: if description.trim().is_empty() {
                FALLBACK_DESCRIPTION.to_string()
            } else {
                description
            },
        }
    }
}

/// A user-visible error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: &'static str,
    pub description: String,
}

/// What happened to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The plan is ready and has been stored as the session's current plan.
    Ready(Materialized),
    /// The session was reset while this submission was in flight; its
    /// results were dropped.
    Discarded,
}

#[derive(Debug, Default)]
struct SessionState {
    /// Bumped by every reset. A flow only applies its results if the epoch
    /// it started under is still current.
    epoch: u64,
    goal: Option<PersistedGoal>,
    plan: Option<GeneratedPlan>,
    persistence: Option<PersistReport>,
}

/// Holds the current goal and plan for one user.
pub struct PlanSession {
    submitter: GoalSubmitter,
    strategy: Arc<dyn PlanStrategy>,
    /// Set for the whole of `submit`, goal creation through materialization.
    processing: AtomicBool,
    state: Mutex<SessionState>,
}

impl std::fmt::Debug for PlanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanSession")
            .field("strategy", &self.strategy.kind())
            .field("processing", &self.is_processing())
            .finish()
    }
}

impl PlanSession {
    pub fn new(api: Arc<dyn GoalApi>, strategy: Arc<dyn PlanStrategy>) -> Self {
        Self {
            submitter: GoalSubmitter::new(api),
            strategy,
            processing: AtomicBool::new(false),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Whether a submission is running, from goal creation until its plan
    /// is applied or it fails.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub async fn current_goal(&self) -> Option<PersistedGoal> {
        self.state.lock().await.goal.clone()
    }

    pub async fn current_plan(&self) -> Option<GeneratedPlan> {
        self.state.lock().await.plan.clone()
    }

    /// Persistence report of the current plan, if its tasks were saved.
    pub async fn last_report(&self) -> Option<PersistReport> {
        self.state.lock().await.persistence.clone()
    }

    /// Create `input` on the backend and materialize a plan for it.
    ///
    /// A call made while another submission is running is refused with
    /// [`SubmitError::InFlight`]. Once the goal is created it replaces the
    /// previous goal, plan and report. If [`reset`](Self::reset) runs before
    /// the flow finishes, the results and any error are dropped and
    /// [`SessionOutcome::Discarded`] is returned.
    pub async fn submit(&self, input: GoalInput) -> Result<SessionOutcome, FlowError> {
        let _guard = ProcessingGuard::acquire(&self.processing).ok_or(SubmitError::InFlight)?;
        let epoch = self.state.lock().await.epoch;

        let goal = match self.submitter.submit(&input).await {
            Ok(goal) => goal,
            Err(SubmitError::InFlight) => return Err(SubmitError::InFlight.into()),
            Err(e) => return self.discard_if_stale(epoch, e.into()).await,
        };

        {
            let mut state = self.state.lock().await;
            if state.epoch != epoch {
                debug!(goal_id = goal.id, "session reset during goal creation");
                return Ok(SessionOutcome::Discarded);
            }
            state.goal = Some(goal.clone());
            state.plan = None;
            state.persistence = None;
        }

        let materialized = match self.strategy.materialize(&goal).await {
            Ok(m) => m,
            Err(e) => return self.discard_if_stale(epoch, e.into()).await,
        };

        let mut state = self.state.lock().await;
        if state.epoch != epoch {
            debug!(goal_id = goal.id, "session reset during materialization");
            return Ok(SessionOutcome::Discarded);
        }
        state.plan = Some(materialized.plan.clone());
        state.persistence = materialized.persistence.clone();
        info!(
            goal_id = goal.id,
            tasks = materialized.plan.tasks.len(),
            strategy = %self.strategy.kind(),
            "plan ready"
        );

        Ok(SessionOutcome::Ready(materialized))
    }

    /// Drop the current goal and plan. Nothing is deleted on the backend.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.epoch += 1;
        state.goal = None;
        state.plan = None;
        state.persistence = None;
        debug!(epoch = state.epoch, "session reset");
    }

    async fn discard_if_stale(
        &self,
        epoch: u64,
        err: FlowError,
    ) -> Result<SessionOutcome, FlowError> {
        if self.state.lock().await.epoch != epoch {
            debug!(error = %err, "dropping error from reset session");
            return Ok(SessionOutcome::Discarded);
        }
        warn!(error = %err, "submission failed");
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::models::{CommitmentLevel, NewTask};
    use crate::plan::SynthesizedStrategy;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct CountingApi {
        next_id: std::sync::atomic::AtomicI64,
    }

    #[async_trait]
    impl GoalApi for CountingApi {
        async fn create_goal(&self, goal: &GoalInput) -> Result<PersistedGoal, ApiError> {
            let id = 42 + self
                .next_id
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(PersistedGoal {
                id,
                title: goal.title.clone(),
                commitment_level: goal.commitment_level,
            })
        }

        async fn create_task(&self, _goal_id: i64, _task: &NewTask) -> Result<(), ApiError> {
            Ok(())
        }
    }

    struct DownApi;

    #[async_trait]
    impl GoalApi for DownApi {
        async fn create_goal(&self, _goal: &GoalInput) -> Result<PersistedGoal, ApiError> {
            Err(ApiError::Status {
                url: "http://backend/api/goals".to_string(),
                status: 500,
                body: "database unavailable".to_string(),
            })
        }

        async fn create_task(&self, _goal_id: i64, _task: &NewTask) -> Result<(), ApiError> {
            Ok(())
        }
    }

    /// Strategy that waits to be released before synthesizing.
    struct GatedStrategy {
        entered: Notify,
        release: Notify,
        inner: SynthesizedStrategy,
    }

    #[async_trait]
    impl PlanStrategy for GatedStrategy {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Synthesized
        }

        async fn materialize(&self, goal: &PersistedGoal) -> Result<Materialized, GenerateError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.materialize(goal).await
        }
    }

    /// Strategy that succeeds once, then reports no plan.
    struct SucceedsOnce {
        calls: std::sync::atomic::AtomicUsize,
        inner: SynthesizedStrategy,
    }

    #[async_trait]
    impl PlanStrategy for SucceedsOnce {
        fn kind(&self) -> StrategyKind {
            StrategyKind::Ai
        }

        async fn materialize(&self, goal: &PersistedGoal) -> Result<Materialized, GenerateError> {
            if self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                self.inner.materialize(goal).await
            } else {
                Err(GenerateError::NoPlan)
            }
        }
    }

    fn synthesized() -> Arc<dyn PlanStrategy> {
        Arc::new(
            SynthesizedStrategy::new()
                .with_seed(4)
                .with_start_date(NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()),
        )
    }

    #[tokio::test]
    async fn submit_stores_goal_and_plan() {
        let session = PlanSession::new(Arc::new(CountingApi::default()), synthesized());

        let outcome = session
            .submit(GoalInput::new("Learn Spanish", CommitmentLevel::Medium))
            .await
            .unwrap();

        let SessionOutcome::Ready(m) = outcome else {
            panic!("expected a ready plan");
        };
        assert_eq!(m.plan.goal.id, 42);
        assert_eq!(m.plan.tasks.len(), 24);
        assert_eq!(session.current_goal().await.unwrap().id, 42);
        assert_eq!(session.current_plan().await.unwrap(), m.plan);
        assert!(session.last_report().await.is_none());
    }

    #[tokio::test]
    async fn reset_clears_state_and_next_plan_is_fresh() {
        let session = PlanSession::new(Arc::new(CountingApi::default()), synthesized());

        session
            .submit(GoalInput::new("Learn Spanish", CommitmentLevel::Medium))
            .await
            .unwrap();
        session.reset().await;
        assert!(session.current_goal().await.is_none());
        assert!(session.current_plan().await.is_none());

        session
            .submit(GoalInput::new("Run a 10k", CommitmentLevel::Low))
            .await
            .unwrap();
        let plan = session.current_plan().await.unwrap();
        assert_eq!(plan.goal.id, 43);
        assert_eq!(plan.tasks.len(), 16);
        assert!(plan.tasks.iter().all(|t| t.goal_id == 43));
        assert!(plan.tasks.iter().all(|t| t.title.starts_with("Run a 10k")));
    }

    #[tokio::test]
    async fn goal_failure_produces_single_notification() {
        let session = PlanSession::new(Arc::new(DownApi), synthesized());

        let err = session
            .submit(GoalInput::new("Learn Spanish", CommitmentLevel::Medium))
            .await
            .unwrap_err();

        assert!(matches!(err, FlowError::Submission(_)));
        let note = err.notification();
        assert_eq!(note.title, ERROR_TITLE);
        assert!(note.description.contains("database unavailable"));
        assert!(session.current_goal().await.is_none());
        assert!(session.current_plan().await.is_none());
    }

    #[tokio::test]
    async fn results_arriving_after_reset_are_discarded() {
        let strategy = Arc::new(GatedStrategy {
            entered: Notify::new(),
            release: Notify::new(),
            inner: SynthesizedStrategy::new().with_seed(1),
        });
        let session = Arc::new(PlanSession::new(
            Arc::new(CountingApi::default()),
            strategy.clone(),
        ));

        let pending = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .submit(GoalInput::new("Learn Spanish", CommitmentLevel::High))
                    .await
            })
        };

        strategy.entered.notified().await;
        session.reset().await;
        strategy.release.notify_one();

        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome, SessionOutcome::Discarded);
        assert!(session.current_goal().await.is_none());
        assert!(session.current_plan().await.is_none());
    }

    #[tokio::test]
    async fn second_submit_during_materialization_is_refused() {
        let strategy = Arc::new(GatedStrategy {
            entered: Notify::new(),
            release: Notify::new(),
            inner: SynthesizedStrategy::new().with_seed(2),
        });
        let session = Arc::new(PlanSession::new(
            Arc::new(CountingApi::default()),
            strategy.clone(),
        ));

        let pending = {
            let session = session.clone();
            tokio::spawn(async move {
                session
                    .submit(GoalInput::new("First", CommitmentLevel::Low))
                    .await
            })
        };

        strategy.entered.notified().await;
        assert!(session.is_processing());

        let err = session
            .submit(GoalInput::new("Second", CommitmentLevel::Low))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Submission(SubmitError::InFlight)));

        strategy.release.notify_one();
        let outcome = pending.await.unwrap().unwrap();
        assert!(matches!(outcome, SessionOutcome::Ready(_)));
        assert!(!session.is_processing());

        let goal = session.current_goal().await.unwrap();
        let plan = session.current_plan().await.unwrap();
        assert_eq!(goal.id, 42);
        assert_eq!(goal.title, "First");
        assert_eq!(plan.goal, goal);
    }

    #[tokio::test]
    async fn failed_resubmit_keeps_nothing_of_prior_plan() {
        let strategy = Arc::new(SucceedsOnce {
            calls: std::sync::atomic::AtomicUsize::new(0),
            inner: SynthesizedStrategy::new().with_seed(3),
        });
        let session = PlanSession::new(Arc::new(CountingApi::default()), strategy);

        session
            .submit(GoalInput::new("First", CommitmentLevel::Low))
            .await
            .unwrap();
        assert!(session.current_plan().await.is_some());

        let err = session
            .submit(GoalInput::new("Second", CommitmentLevel::Low))
            .await
            .unwrap_err();
        assert!(matches!(err, FlowError::Generation(GenerateError::NoPlan)));

        let goal = session.current_goal().await.unwrap();
        assert_eq!(goal.id, 43);
        assert_eq!(goal.title, "Second");
        assert!(session.current_plan().await.is_none());
        assert!(session.last_report().await.is_none());
        assert!(!session.is_processing());
    }

    #[test]
    fn generation_failure_notification_names_cause() {
        let err = FlowError::Generation(GenerateError::NoPlan);
        let note = err.notification();
        assert_eq!(note.title, "Error generating plan");
        assert_eq!(note.description, "planning service returned no plan");
    }
}
