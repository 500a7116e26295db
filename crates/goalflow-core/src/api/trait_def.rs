//! The `GoalApi` trait -- the adapter interface for the goal backend.

use async_trait::async_trait;

use super::error::ApiError;
use crate::models::{GoalInput, NewTask, PersistedGoal};

/// Persistence operations the pipeline needs from the backend.
///
/// Object-safe so it can be shared as `Arc<dyn GoalApi>`.
#[async_trait]
pub trait GoalApi: Send + Sync {
    /// Store a goal and return the server's representation, including the
    /// assigned identifier.
    async fn create_goal(&self, goal: &GoalInput) -> Result<PersistedGoal, ApiError>;

    /// Store one task under an already-persisted goal. The response body is
    /// not used.
    async fn create_task(&self, goal_id: i64, task: &NewTask) -> Result<(), ApiError>;
}

// Compile-time assertion: GoalApi must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn GoalApi) {}
};
