use std::sync::Arc;

use crate::{
    dto::{RouteDto, RouteRequest, VisibilityRequest},
    poller::{self, PollerState},
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info};

pub async fn route(State(state): State<Arc<AppState>>) -> Response {
    let session = state.session.read().await;
    Json(RouteDto::from(session.route_name(), session.repository())).into_response()
}

pub async fn routes(State(state): State<Arc<AppState>>) -> Response {
    let session = state.session.read().await;
    let names: Vec<String> = session
        .repository()
        .route_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    Json(names).into_response()
}

pub async fn select_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> Result<Response, StatusCode> {
    let route_name = request.route_name.trim();
    if route_name.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let repository = state
        .statics
        .repository_for(route_name)
        .await
        .map_err(|err| {
            error!("Failed to load static data for route {route_name}: {err}");
            StatusCode::BAD_GATEWAY
        })?;
    if repository.variants_by_route_name(route_name).is_none() {
        return Err(StatusCode::NOT_FOUND);
    }

    let dto = RouteDto::from(route_name, &repository);
    state
        .session
        .write()
        .await
        .set_repository(repository, route_name);

    // Fetch the new route right away instead of waiting for the next poll
    if *state.poller.borrow() == PollerState::Running {
        let state = state.clone();
        tokio::spawn(async move { poller::poll_once(&state).await });
    }
    Ok(Json(dto).into_response())
}

pub async fn visibility(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VisibilityRequest>,
) -> Result<Response, StatusCode> {
    let next = if request.visible {
        PollerState::Running
    } else {
        PollerState::Paused
    };
    let changed = state.poller.send_if_modified(|current| {
        if *current == PollerState::Stopped || *current == next {
            return false;
        }
        *current = next;
        true
    });
    if changed {
        info!("Polling {:?}", next);
        if next == PollerState::Paused {
            // Markers are placed fresh once the view comes back
            state.session.write().await.reset();
        }
    }
    Ok(().into_response())
}
