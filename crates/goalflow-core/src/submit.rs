//! Goal submission: send a goal to the backend and hand back the stored copy.
//!
//! A [`GoalSubmitter`] allows one pending submission at a time. A second call
//! made while the first is still waiting on the backend is refused with
//! [`SubmitError::InFlight`] without sending anything.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiError, GoalApi};
use crate::models::{GoalInput, PersistedGoal};

/// Errors from [`GoalSubmitter::submit`].
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("goal title must not be empty")]
    EmptyTitle,

    #[error("a goal submission is already being processed")]
    InFlight,

    #[error("failed to create goal: {0}")]
    Api(#[from] ApiError),
}

/// Sends goals to the backend, one at a time.
pub struct GoalSubmitter {
    api: Arc<dyn GoalApi>,
    processing: AtomicBool,
}

impl std::fmt::Debug for GoalSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoalSubmitter")
            .field("processing", &self.is_processing())
            .finish()
    }
}

impl GoalSubmitter {
    pub fn new(api: Arc<dyn GoalApi>) -> Self {
        Self {
            api,
            processing: AtomicBool::new(false),
        }
    }

    /// The backend this submitter writes to.
    pub fn api(&self) -> &Arc<dyn GoalApi> {
        &self.api
    }

    /// Whether a submission is currently waiting on the backend.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Create `goal` on the backend.
    ///
    /// The title is trimmed before sending; a blank title is rejected
    /// locally.
    pub async fn submit(&self, goal: &GoalInput) -> Result<PersistedGoal, SubmitError> {
        let title = goal.title.trim();
        if title.is_empty() {
            return Err(SubmitError::EmptyTitle);
        }

        let _guard = ProcessingGuard::acquire(&self.processing).ok_or(SubmitError::InFlight)?;

        let input = GoalInput::new(title, goal.commitment_level);
        match self.api.create_goal(&input).await {
            Ok(persisted) => {
                info!(
                    goal_id = persisted.id,
                    title = %persisted.title,
                    commitment = %persisted.commitment_level,
                    "goal created"
                );
                Ok(persisted)
            }
            Err(e) => {
                warn!(title = %input.title, error = %e, "goal creation failed");
                Err(e.into())
            }
        }
    }
}

/// Holds a `processing` flag for the duration of one submission and
/// clears it on drop, including when the future is cancelled.
pub(crate) struct ProcessingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ProcessingGuard<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitmentLevel, NewTask};
    use async_trait::async_trait;
    use tokio::sync::{Mutex, Notify};

    /// Backend that records goals and assigns sequential ids.
    #[derive(Default)]
    struct RecordingApi {
        goals: Mutex<Vec<GoalInput>>,
    }

    #[async_trait]
    impl GoalApi for RecordingApi {
        async fn create_goal(&self, goal: &GoalInput) -> Result<PersistedGoal, ApiError> {
            let mut goals = self.goals.lock().await;
            goals.push(goal.clone());
            Ok(PersistedGoal {
                id: 41 + goals.len() as i64,
                title: goal.title.clone(),
                commitment_level: goal.commitment_level,
            })
        }

        async fn create_task(&self, _goal_id: i64, _task: &NewTask) -> Result<(), ApiError> {
            Ok(())
        }
    }

    /// Backend whose goal creation blocks until released.
    #[derive(Default)]
    struct GatedApi {
        release: Notify,
    }

    #[async_trait]
    impl GoalApi for GatedApi {
        async fn create_goal(&self, goal: &GoalInput) -> Result<PersistedGoal, ApiError> {
            self.release.notified().await;
            Ok(PersistedGoal {
                id: 1,
                title: goal.title.clone(),
                commitment_level: goal.commitment_level,
            })
        }

        async fn create_task(&self, _goal_id: i64, _task: &NewTask) -> Result<(), ApiError> {
            Ok(())
        }
    }

    struct FailingApi;

    #[async_trait]
    impl GoalApi for FailingApi {
        async fn create_goal(&self, _goal: &GoalInput) -> Result<PersistedGoal, ApiError> {
            Err(ApiError::Status {
                url: "http://backend/api/goals".to_string(),
                status: 500,
                body: "boom".to_string(),
            })
        }

        async fn create_task(&self, _goal_id: i64, _task: &NewTask) -> Result<(), ApiError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn submit_returns_persisted_goal() {
        let api = Arc::new(RecordingApi::default());
        let submitter = GoalSubmitter::new(api.clone());

        let goal = submitter
            .submit(&GoalInput::new("Learn Spanish", CommitmentLevel::Medium))
            .await
            .unwrap();

        assert_eq!(goal.id, 42);
        assert_eq!(goal.title, "Learn Spanish");
        assert_eq!(goal.commitment_level, CommitmentLevel::Medium);
        assert!(!submitter.is_processing());
    }

    #[tokio::test]
    async fn submit_trims_title() {
        let api = Arc::new(RecordingApi::default());
        let submitter = GoalSubmitter::new(api.clone());

        submitter
            .submit(&GoalInput::new("  Read more  ", CommitmentLevel::Low))
            .await
            .unwrap();

        assert_eq!(api.goals.lock().await[0].title, "Read more");
    }

    #[tokio::test]
    async fn blank_title_is_rejected_without_request() {
        let api = Arc::new(RecordingApi::default());
        let submitter = GoalSubmitter::new(api.clone());

        let err = submitter
            .submit(&GoalInput::new("   ", CommitmentLevel::High))
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::EmptyTitle));
        assert!(api.goals.lock().await.is_empty());
    }

    #[tokio::test]
    async fn backend_failure_is_reported_and_guard_released() {
        let submitter = GoalSubmitter::new(Arc::new(FailingApi));

        let err = submitter
            .submit(&GoalInput::new("Learn Spanish", CommitmentLevel::Medium))
            .await
            .unwrap_err();

        match err {
            SubmitError::Api(api) => assert_eq!(api.status(), Some(500)),
            other => panic!("expected Api error, got {other:?}"),
        }
        assert!(!submitter.is_processing());
    }

    #[tokio::test]
    async fn second_submission_while_pending_is_refused() {
        let api = Arc::new(GatedApi::default());
        let submitter = Arc::new(GoalSubmitter::new(api.clone()));

        let first = {
            let submitter = submitter.clone();
            tokio::spawn(async move {
                submitter
                    .submit(&GoalInput::new("First", CommitmentLevel::Low))
                    .await
            })
        };

        while !submitter.is_processing() {
            tokio::task::yield_now().await;
        }

        let err = submitter
            .submit(&GoalInput::new("Second", CommitmentLevel::Low))
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::InFlight));

        api.release.notify_one();
        let goal = first.await.unwrap().unwrap();
        assert_eq!(goal.title, "First");
        assert!(!submitter.is_processing());
    }
}
