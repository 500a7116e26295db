//! Core pipeline for turning a personal goal into an eight-week plan.
//!
//! ```text
//! GoalInput --GoalSubmitter--> PersistedGoal --PlanStrategy--> Materialized
//!                                                  |
//!                             SynthesizedStrategy  |  AiStrategy
//!                             (in memory only)     |  (Planner + per-task saves)
//! ```
//!
//! [`session::PlanSession`] ties the steps together and holds the state a
//! front end displays.

pub mod api;
pub mod models;
pub mod plan;
pub mod session;
pub mod submit;

pub use models::{CommitmentLevel, GeneratedPlan, GoalInput, NewTask, PersistedGoal, Task};
