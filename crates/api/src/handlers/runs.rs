use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::{ApiError, AppState};

#[derive(Serialize)]
pub struct JobRunDto {
    pub run_id: String,
    pub job: String,
    pub state: String,
}

#[derive(Serialize)]
pub struct ToggleActiveDto {
    pub active: bool,
}

pub async fn submit_run(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<JobRunDto>), ApiError> {
    let handle = state.scheduler.run_job(&name).await?;
    let dto = JobRunDto {
        run_id: handle.run_id.clone(),
        job: handle.job_name.clone(),
        state: handle.overall_state().await.to_string(),
    };
    Ok((StatusCode::ACCEPTED, Json(dto)))
}

pub async fn toggle_active(
    Path(name): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<ToggleActiveDto>, ApiError> {
    let active = state.scheduler.toggle_active(&name).await?;
    Ok(Json(ToggleActiveDto { active }))
}
