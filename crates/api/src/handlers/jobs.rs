use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use super::{ApiError, AppState};

#[derive(Serialize)]
pub struct JobSummary {
    pub name: String,
    pub schedule: String,
    pub active: bool,
}

#[derive(Serialize)]
pub struct JobDetail {
    pub name: String,
    pub schedule: String,
    pub active: bool,
    pub tasks: Vec<String>,
}

#[derive(Serialize)]
pub struct EdgeDto {
    pub from: String,
    pub to: String,
}

#[derive(Serialize)]
pub struct DagDto {
    pub nodes: Vec<String>,
    pub edges: Vec<EdgeDto>,
}

pub async fn list(State(state): State<AppState>) -> Json<Vec<JobSummary>> {
    let jobs = state
        .scheduler
        .list_jobs()
        .await
        .into_iter()
        .map(|(name, schedule, active)| JobSummary { name, schedule, active })
        .collect();
    Json(jobs)
}

pub async fn get(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<JobDetail>, ApiError> {
    let (name, schedule, active) = state.scheduler.job_summary(&name).await?;
    let job = state.scheduler.describe_job(&name).await?;
    let tasks = job.tasks.into_iter().map(|t| t.name).collect();
    Ok(Json(JobDetail { name, schedule, active, tasks }))
}

pub async fn get_dag(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<DagDto>, ApiError> {
    let job = state.scheduler.describe_job(&name).await?;
    let nodes = job.dag.nodes().map(str::to_owned).collect();
    let edges = job
        .dag
        .edges()
        .into_iter()
        .map(|(from, to)| EdgeDto { from, to })
        .collect();
    Ok(Json(DagDto { nodes, edges }))
}
