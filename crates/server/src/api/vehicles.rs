use std::sync::Arc;

use crate::{dto::VehicleDto, state::AppState};
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

pub async fn vehicles(State(state): State<Arc<AppState>>) -> Response {
    let result: Vec<VehicleDto> = state
        .session
        .read()
        .await
        .frames()
        .iter()
        .map(VehicleDto::from)
        .collect();
    Json(result).into_response()
}
