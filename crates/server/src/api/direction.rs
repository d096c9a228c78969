use std::{collections::HashMap, sync::Arc};

use crate::{dto::DirectionDto, state::AppState};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

pub async fn direction(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> Result<Response, StatusCode> {
    let Some(stop_id) = params.get("stop_id") else {
        return Err(StatusCode::BAD_REQUEST);
    };
    let order: Option<u32> = match params.get("order") {
        Some(value) => match value.parse() {
            Ok(value) => Some(value),
            Err(_) => return Err(StatusCode::BAD_REQUEST),
        },
        None => None,
    };
    let variant_id = params.get("variant_id").map(String::as_str);
    let direction = state
        .session
        .read()
        .await
        .resolve_direction(stop_id, order, variant_id);
    Ok(Json(DirectionDto {
        stop_id: stop_id.to_string(),
        order,
        direction,
    })
    .into_response())
}
