//! Plan management: synthesis, AI generation, materialization.

pub mod generate;
pub mod materialize;
pub mod synthesize;

pub use generate::{
    GenerateError, HttpPlanner, PlanDraft, Planner, TaskDraft, build_planning_prompt,
    parse_due_date, tasks_from_draft,
};
pub use materialize::{
    AiStrategy, Materialized, PersistReport, PlanStrategy, StrategyKind, SynthesizedStrategy,
    TaskOutcome, persist_tasks,
};
pub use synthesize::synthesize_tasks;
