//! Shared test utilities for goalflow integration tests.
//!
//! Provides [`FakeBackend`], an in-process HTTP server bound to an ephemeral
//! port that stands in for both the goal backend and the planning service.
//! It records every request it receives and can be told to fail:
//! - goal creation (`POST /api/goals`),
//! - task saves whose title is in a configured set
//!   (`POST /api/goals/{goalId}/tasks`),
//! - the planner (`POST /planner`), by status code or a `null` body.
//!
//! Each test starts its own backend; dropping it shuts the server down.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};

/// What the fake planner answers with.
#[derive(Debug, Clone)]
pub enum PlannerReply {
    /// 200 with this JSON body.
    Plan(Value),
    /// 200 with a JSON `null` body.
    Null,
    /// An error status with a short JSON error body.
    Status(u16),
}

/// A task save the backend received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTask {
    /// Goal id taken from the request path.
    pub goal_id: i64,
    /// The JSON body as sent.
    pub body: Value,
}

#[derive(Debug)]
struct Behavior {
    next_goal_id: i64,
    fail_goals: bool,
    fail_task_titles: HashSet<String>,
    planner: PlannerReply,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            next_goal_id: 42,
            fail_goals: false,
            fail_task_titles: HashSet::new(),
            planner: PlannerReply::Plan(json!({ "tasks": [] })),
        }
    }
}

#[derive(Debug, Default)]
struct Recorded {
    goals: Vec<Value>,
    tasks: Vec<RecordedTask>,
    planner_requests: Vec<Value>,
}

#[derive(Debug, Default)]
struct Shared {
    behavior: Mutex<Behavior>,
    recorded: Mutex<Recorded>,
}

/// In-process stand-in for the goal backend and planning service.
pub struct FakeBackend {
    addr: SocketAddr,
    shared: Arc<Shared>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl FakeBackend {
    /// Bind to `127.0.0.1:0` and start serving. Goal ids start at 42.
    pub async fn start() -> Self {
        let shared = Arc::new(Shared::default());
        let app = router(shared.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind fake backend");
        let addr = listener.local_addr().expect("fake backend has no address");

        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await;
        });

        Self {
            addr,
            shared,
            shutdown: Some(tx),
        }
    }

    /// Base URL of the backend (no trailing slash).
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Endpoint of the fake planner.
    pub fn planner_url(&self) -> String {
        format!("{}/planner", self.url())
    }

    // -- behavior --

    /// Identifier handed to the next created goal.
    pub async fn set_next_goal_id(&self, id: i64) {
        self.shared.behavior.lock().await.next_goal_id = id;
    }

    /// Make every `POST /api/goals` answer 500.
    pub async fn fail_goal_creation(&self) {
        self.shared.behavior.lock().await.fail_goals = true;
    }

    /// Make task saves with one of these titles answer 500.
    pub async fn fail_tasks_titled(&self, titles: &[&str]) {
        let mut behavior = self.shared.behavior.lock().await;
        behavior
            .fail_task_titles
            .extend(titles.iter().map(|t| t.to_string()));
    }

    pub async fn set_planner_reply(&self, reply: PlannerReply) {
        self.shared.behavior.lock().await.planner = reply;
    }

    // -- recorded requests --

    pub async fn goals(&self) -> Vec<Value> {
        self.shared.recorded.lock().await.goals.clone()
    }

    pub async fn tasks(&self) -> Vec<RecordedTask> {
        self.shared.recorded.lock().await.tasks.clone()
    }

    pub async fn planner_requests(&self) -> Vec<Value> {
        self.shared.recorded.lock().await.planner_requests.clone()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn router(shared: Arc<Shared>) -> Router {
    Router::new()
        .route("/api/goals", post(create_goal))
        .route("/api/goals/{goal_id}/tasks", post(create_task))
        .route("/planner", post(plan))
        .with_state(shared)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn create_goal(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    shared.recorded.lock().await.goals.push(body.clone());

    let mut behavior = shared.behavior.lock().await;
    if behavior.fail_goals {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to create goal");
    }

    let id = behavior.next_goal_id;
    behavior.next_goal_id += 1;

    let mut stored = body;
    if let Some(obj) = stored.as_object_mut() {
        obj.insert("id".to_string(), json!(id));
    }
    (StatusCode::CREATED, Json(stored)).into_response()
}

async fn create_task(
    State(shared): State<Arc<Shared>>,
    Path(goal_id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    shared.recorded.lock().await.tasks.push(RecordedTask {
        goal_id,
        body: body.clone(),
    });

    let title = body.get("title").and_then(Value::as_str).unwrap_or("");
    if shared.behavior.lock().await.fail_task_titles.contains(title) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to create task");
    }

    (StatusCode::CREATED, Json(body)).into_response()
}

async fn plan(State(shared): State<Arc<Shared>>, Json(body): Json<Value>) -> Response {
    shared.recorded.lock().await.planner_requests.push(body);

    let reply = shared.behavior.lock().await.planner.clone();
    match reply {
        PlannerReply::Plan(plan) => (StatusCode::OK, Json(plan)).into_response(),
        PlannerReply::Null => (StatusCode::OK, Json(Value::Null)).into_response(),
        PlannerReply::Status(code) => error_response(
            StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            "planner unavailable",
        ),
    }
}
