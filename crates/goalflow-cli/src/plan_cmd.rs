//! `goalflow plan` command: submit one goal and show the resulting plan.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tracing::debug;

use goalflow_core::api::{GoalApi, HttpGoalApi};
use goalflow_core::plan::{
    AiStrategy, HttpPlanner, Materialized, PersistReport, PlanStrategy, StrategyKind,
    SynthesizedStrategy,
};
use goalflow_core::session::{PlanSession, SessionOutcome};
use goalflow_core::{CommitmentLevel, GoalInput};

use crate::config::GoalflowConfig;

/// How the plan is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments of one `goalflow plan` invocation.
#[derive(Debug, Clone)]
pub struct PlanArgs {
    pub title: String,
    pub commitment: CommitmentLevel,
    pub format: OutputFormat,
    /// Output file path (defaults to stdout).
    pub output: Option<String>,
}

/// Build the strategy selected by `config`.
pub fn build_strategy(
    config: &GoalflowConfig,
    api: Arc<dyn GoalApi>,
) -> Result<Arc<dyn PlanStrategy>> {
    let strategy: Arc<dyn PlanStrategy> = match config.strategy {
        StrategyKind::Synthesized => Arc::new(SynthesizedStrategy::new()),
        StrategyKind::Ai => {
            let planner_config = config
                .planner
                .as_ref()
                .context("the ai strategy needs a planner endpoint")?;
            let planner = HttpPlanner::new(
                planner_config.endpoint.clone(),
                planner_config.api_key.clone(),
                config.api.request_timeout,
            )
            .context("invalid planner endpoint")?;
            Arc::new(AiStrategy::new(planner, api))
        }
    };
    Ok(strategy)
}

/// Submit the goal and return the materialized plan.
///
/// A failed submission becomes an error whose outermost message is the
/// user notification title.
pub async fn generate(config: &GoalflowConfig, args: &PlanArgs) -> Result<Materialized> {
    let api: Arc<dyn GoalApi> =
        Arc::new(HttpGoalApi::new(config.api.clone()).context("invalid backend URL")?);
    let strategy = build_strategy(config, api.clone())?;
    let session = PlanSession::new(api, strategy);
    debug!(
        base_url = %config.api.base_url,
        strategy = %config.strategy,
        "submitting goal"
    );

    match session
        .submit(GoalInput::new(args.title.clone(), args.commitment))
        .await
    {
        Ok(SessionOutcome::Ready(materialized)) => Ok(materialized),
        Ok(SessionOutcome::Discarded) => bail!("submission was discarded"),
        Err(e) => {
            let note = e.notification();
            Err(anyhow::Error::new(e).context(note.title))
        }
    }
}

/// Run the plan command.
pub async fn run_plan(config: &GoalflowConfig, args: &PlanArgs) -> Result<()> {
    let materialized = generate(config, args).await?;
    let rendered = render(&materialized, args.format)?;

    match args.output.as_deref() {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("cannot write output file: {path}"))?;
            println!(
                "Wrote {} tasks to {path}",
                materialized.plan.tasks.len()
            );
        }
        None => print!("{rendered}"),
    }

    Ok(())
}

/// Render a plan in the requested format.
pub fn render(materialized: &Materialized, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(materialized)
                .context("failed to serialize plan")?;
            json.push('\n');
            Ok(json)
        }
        OutputFormat::Text => Ok(render_text(materialized)),
    }
}

fn render_text(materialized: &Materialized) -> String {
    let plan = &materialized.plan;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Goal: {} (#{}, {} commitment)",
        plan.goal.title, plan.goal.id, plan.goal.commitment_level
    );
    let _ = writeln!(
        out,
        "Window: {} to {} ({} weeks)",
        plan.start_date, plan.end_date, plan.weeks
    );

    for week in 1..=plan.weeks {
        let tasks: Vec<_> = plan.tasks_in_week(week).collect();
        if tasks.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\nWeek {week}");
        for task in tasks {
            let due = task
                .due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "no date".to_string());
            let _ = writeln!(out, "  [{due}] {}", task.title);
            if !task.description.is_empty() {
                let _ = writeln!(out, "      {}", task.description);
            }
        }
    }
    if plan.tasks.is_empty() {
        let _ = writeln!(out, "\nNo tasks.");
    }

    out.push('\n');
    match &materialized.persistence {
        Some(report) => render_report(&mut out, report),
        None => {
            let _ = writeln!(out, "Tasks kept in memory only (synthesized plan).");
        }
    }

    out
}

fn render_report(out: &mut String, report: &PersistReport) {
    let _ = writeln!(
        out,
        "Saved {}/{} tasks ({} failed)",
        report.succeeded(),
        report.attempted(),
        report.failed()
    );
    for failure in report.failures() {
        let _ = writeln!(
            out,
            "  failed: {}: {}",
            failure.title,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
}
