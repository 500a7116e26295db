//! Backend REST API client.
//!
//! The [`GoalApi`] trait is the seam between the pipeline and the backend
//! that stores goals and tasks. [`HttpGoalApi`] talks to the real service
//! over HTTP; tests substitute in-memory implementations.
//!
//! ```text
//! GoalSubmitter --create_goal--> POST /api/goals
//! AiStrategy ----create_task---> POST /api/goals/{goalId}/tasks  (one per task)
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod trait_def;

pub use config::ApiConfig;
pub use error::ApiError;
pub use http::HttpGoalApi;
pub use trait_def::GoalApi;
