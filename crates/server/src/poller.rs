//! Polls live vehicle locations for the selected route on a fixed interval.

use std::sync::Arc;

use futures_util::future::join_all;
use snapline::prelude::*;
use tokio::{sync::watch, time::MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Running,
    /// Nobody is watching, skip polling until resumed.
    Paused,
    Stopped,
}

/// Every fix of one poll, for one route.
#[derive(Debug, Clone)]
pub struct FixBatch {
    pub route_name: Arc<str>,
    pub fixes: Vec<VehicleFix>,
}

pub async fn run(state: Arc<AppState>, mut commands: watch::Receiver<PollerState>) {
    let mut interval = tokio::time::interval(state.settings.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let current = *commands.borrow_and_update();
        match current {
            PollerState::Stopped => break,
            PollerState::Paused => {
                debug!("Poller paused");
                if commands.changed().await.is_err() {
                    break;
                }
                // Resume with a fresh poll instead of waiting out the interval
                interval.reset_immediately();
            }
            PollerState::Running => {
                tokio::select! {
                    _ = interval.tick() => poll_once(&state).await,
                    changed = commands.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    }
    info!("Poller stopped");
}

/// Fetches every variant of the selected route and queues the result as one batch.
/// A failed variant drops the whole poll, the previous fixes stay on screen.
pub async fn poll_once(state: &AppState) {
    let Some(live) = &state.live else {
        return;
    };
    let (route_name, variant_ids): (Arc<str>, Vec<Arc<str>>) = {
        let session = state.session.read().await;
        let variant_ids = session
            .repository()
            .variants_by_route_name(session.route_name())
            .unwrap_or_default()
            .into_iter()
            .map(|variant| variant.id.clone())
            .collect();
        (session.route_name().into(), variant_ids)
    };
    if variant_ids.is_empty() {
        return;
    }

    let results = join_all(variant_ids.iter().map(|id| live.vehicles(id))).await;
    let mut fixes: Vec<VehicleFix> = Vec::new();
    for (id, result) in variant_ids.iter().zip(results) {
        match result {
            Ok(vehicles) => fixes.extend(vehicles),
            Err(err) => {
                warn!("Polling route variant {id} failed: {err}");
                return;
            }
        }
    }
    debug!("Polled {} vehicles on route {route_name}", fixes.len());
    state.queue.push(FixBatch { route_name, fixes });
}
