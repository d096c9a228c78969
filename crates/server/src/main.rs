mod animation;
mod api;
mod cache;
mod dto;
mod fetch;
mod live;
mod poller;
mod settings;
mod state;
mod statics;

use crate::{
    live::LiveClient, poller::PollerState, settings::Settings, state::AppState,
    statics::StaticData,
};
use axum::routing::{get, post};
use snapline::prelude::*;
use std::{sync::Arc, time::Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};

const PORT: u32 = 3000;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().init();

    info!("Starting server...");
    let args: Vec<_> = std::env::args().collect();
    let settings = match Settings::from_env(&args) {
        Ok(settings) => settings,
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    };

    info!("Loading static data...");
    let now = Instant::now();
    let client = reqwest::Client::new();
    let statics = match StaticData::load(&settings, client.clone()).await {
        Ok(statics) => statics,
        Err(err) => {
            error!("Failed to load static data: {err}");
            std::process::exit(1);
        }
    };
    let repository = match (&statics, settings.initial_route.as_deref()) {
        (_, Some(route_name)) => match statics.repository_for(route_name).await {
            Ok(repository) => repository,
            Err(err) => {
                warn!("Failed to load route {route_name}: {err}");
                Arc::new(Repository::new())
            }
        },
        (StaticData::Local(repository), None) => repository.clone(),
        (StaticData::Remote(_), None) => Arc::new(Repository::new()),
    };
    let route_name = settings
        .initial_route
        .clone()
        .or_else(|| repository.route_names().first().map(|name| name.to_string()))
        .unwrap_or_default();
    info!("Loading static data took {:?}", now.elapsed());

    let live = match &settings.live_api_url {
        Some(url) => Some(LiveClient::new(
            client,
            url,
            &settings.service_key,
            &settings.city_code,
            settings.retry.clone(),
        )),
        None => {
            warn!("LIVE_API_URL is not set, no vehicles will be polled");
            None
        }
    };

    let session = RouteSession::new(repository, &route_name, settings.engine.clone());
    let (poller, commands) = watch::channel(PollerState::Running);
    let state = Arc::new(AppState::new(settings, statics, live, session, poller));
    tokio::spawn(poller::run(state.clone(), commands));
    tokio::spawn(animation::run(state.clone()));

    let app = axum::Router::new()
        .route("/vehicles", get(api::vehicles))
        .route("/direction", get(api::direction))
        .route("/route", get(api::route).post(api::select_route))
        .route("/routes", get(api::routes))
        .route("/visibility", post(api::visibility))
        .route("/stream", get(api::stream))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", PORT))
        .await
        .unwrap();
    info!("Listening to port {PORT}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(state))
        .await
        .unwrap();
}

async fn shutdown(state: Arc<AppState>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown: {err}");
    }
    info!("Shutting down...");
    state.poller.send_replace(PollerState::Stopped);
}
