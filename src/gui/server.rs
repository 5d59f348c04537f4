//! Web server for the GUI API endpoints

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::auth::AuthContext;
use crate::config::Config;
use crate::store::LocalStore;
use crate::sync::{derive, SyncEngine};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Sync engine mirroring the signed-in user's hierarchy
    pub engine: Arc<Mutex<SyncEngine>>,
    /// Broadcast channel for sending updates to WebSocket clients
    pub update_tx: broadcast::Sender<String>,
}

/// Start the GUI web server
pub async fn start_server(
    data_dir: &Path,
    port: u16,
    host: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(data_dir)?;
    let store = LocalStore::open(data_dir)?;
    let auth = match &config.user {
        Some(user) => AuthContext::with_user(user.clone()),
        None => AuthContext::signed_out(),
    };

    let mut engine = SyncEngine::new(Arc::new(store), auth);
    engine.attach();
    engine.pump();
    let mut reloads = engine.subscribe_reloads();
    let engine = Arc::new(Mutex::new(engine));

    let (update_tx, _) = broadcast::channel(100);

    // Forward engine reload notifications to websocket clients.
    let forward_tx = update_tx.clone();
    tokio::spawn(async move {
        while let Ok(msg) = reloads.recv().await {
            let _ = forward_tx.send(msg);
        }
    });

    // Pump the engine so the mirror tracks store mutations made by the CLI.
    let pump_engine = engine.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(std::time::Duration::from_millis(250));
        loop {
            tick.tick().await;
            pump_engine.lock().await.pump();
        }
    });

    let state = AppState { engine, update_tx };

    let app = Router::new()
        .route("/", get(serve_index))
        .route("/api/goals", get(get_goals))
        .route("/api/goals/:id", get(get_goal))
        .route("/api/today", get(get_today))
        .route("/ws", get(crate::gui::websocket::ws_handler))
        .with_state(state);

    let host_addr: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::new(host_addr, port);
    tracing::info!(%addr, "GUI server listening");
    println!("PlanPilot GUI at http://{addr}/");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_index() -> impl IntoResponse {
    Html(
        r#"<!doctype html>
<html>
<head><title>PlanPilot</title></head>
<body>
<h1>PlanPilot</h1>
<p>API: <a href="/api/goals">/api/goals</a>, <a href="/api/today">/api/today</a>.
Live reload events on <code>/ws</code>.</p>
</body>
</html>"#,
    )
}

async fn get_goals(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.lock().await;
    let mirror = engine.mirror();
    let goals: Vec<serde_json::Value> = mirror
        .goals()
        .map(|goal| {
            serde_json::json!({
                "id": goal.id,
                "name": goal.name,
                "timeframe": goal.timeframe,
                "progress": derive::goal_progress(mirror, &goal.id).unwrap_or(goal.progress),
                "milestones": mirror.milestones_for(&goal.id).len(),
                "tasks": mirror.tasks_for_goal(&goal.id).count(),
            })
        })
        .collect();
    Json(goals)
}

async fn get_goal(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> impl IntoResponse {
    let engine = state.engine.lock().await;
    let mirror = engine.mirror();
    let Some(goal) = mirror.goal(&id) else {
        return (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "goal not found"})))
            .into_response();
    };

    let milestones: Vec<serde_json::Value> = mirror
        .milestones_for(&id)
        .iter()
        .map(|milestone| {
            serde_json::json!({
                "milestone": milestone,
                "tasks": mirror.tasks_for(&milestone.id),
            })
        })
        .collect();

    Json(serde_json::json!({
        "goal": goal,
        "progress": derive::goal_progress(mirror, &id).unwrap_or(goal.progress),
        "milestones": milestones,
    }))
    .into_response()
}

async fn get_today(State(state): State<AppState>) -> impl IntoResponse {
    let engine = state.engine.lock().await;
    let mirror = engine.mirror();
    let date = chrono::Local::now().date_naive();
    let tasks: Vec<serde_json::Value> = derive::ranked_tasks(mirror)
        .into_iter()
        .filter(|task| task.date == date)
        .map(|task| {
            serde_json::json!({
                "task": task,
                "priority": task.priority().map(|t| t.to_string()),
            })
        })
        .collect();
    Json(serde_json::json!({ "date": date, "tasks": tasks }))
}
