use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::figment::Figment;
use rocket::fs::{relative, FileServer};
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde::Serialize;
use tracing::error;

use crate::models::StoredDocument;
use crate::runner::{PipelineRunner, RunStatus};
use crate::storage::DocumentStore;

/// Upper bound for `?limit=` on the news listing.
const MAX_NEWS_LIMIT: i64 = 100;

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub runner: PipelineRunner,
    pub store: Arc<dyn DocumentStore>,
    /// Default page size for `/api/v1/overview` and `/api/v1/news`
    pub latest_limit: i64,
}

impl AppState {
    pub fn new(runner: PipelineRunner, store: Arc<dyn DocumentStore>, latest_limit: i64) -> Self {
        Self {
            started_at: Utc::now(),
            runner,
            store,
            latest_limit,
        }
    }

    async fn latest(&self, limit: i64) -> Result<Vec<StoredDocument>, Status> {
        self.store.query_latest(limit).await.map_err(|e| {
            error!(error = %e, "failed to query latest news");
            Status::InternalServerError
        })
    }
}

#[derive(Serialize)]
struct OverviewResponse {
    status: RunStatus,
    news: Vec<StoredDocument>,
}

#[derive(Serialize)]
struct TriggerResponse {
    started: bool,
    status: RunStatus,
}

/// Response structure for `/api/v1/status`.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    run: RunStatus,
}

/// Redirect to the operator page.
#[get("/")]
async fn index() -> Redirect {
    Redirect::to("/static/index.html")
}

/// Latest documents plus the run flag.
#[get("/api/v1/overview")]
async fn overview(state: &State<AppState>) -> Result<Json<OverviewResponse>, Status> {
    let news = state.latest(state.latest_limit).await?;
    Ok(Json(OverviewResponse {
        status: state.runner.status(),
        news,
    }))
}

/// Start a run if none is active, then go back to `/`.
#[get("/run_pipeline")]
async fn run_pipeline(state: &State<AppState>) -> Redirect {
    state.runner.start_if_idle();
    Redirect::to("/")
}

#[post("/api/v1/run")]
async fn trigger_run(state: &State<AppState>) -> Json<TriggerResponse> {
    let started = state.runner.start_if_idle();
    Json(TriggerResponse {
        started,
        status: state.runner.status(),
    })
}

#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        run: state.runner.status(),
    })
}

#[get("/api/v1/news?<limit>")]
async fn list_news(state: &State<AppState>, limit: Option<i64>) -> Result<Json<Vec<StoredDocument>>, Status> {
    let limit = limit.unwrap_or(state.latest_limit).clamp(1, MAX_NEWS_LIMIT);
    Ok(Json(state.latest(limit).await?))
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

/// Rocket instance with state and routes mounted, not yet launched.
pub fn build_rocket(state: AppState, figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .mount(
            "/",
            routes![index, overview, run_pipeline, trigger_run, status, list_news, health],
        )
        .mount("/static", FileServer::from(relative!("static")))
}

/// Serve the control surface on `bind:port` until shutdown.
pub async fn launch_rocket(state: AppState, bind: &str, port: u16) -> Result<()> {
    let figment = rocket::Config::figment()
        .merge(("address", bind.to_string()))
        .merge(("port", port));

    tracing::info!("Starting Rocket HTTP server");
    build_rocket(state, figment)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
