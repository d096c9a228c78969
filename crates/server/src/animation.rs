//! The frame loop: applies queued fixes in arrival order, then advances every marker.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::{poller::PollerState, state::AppState};

pub async fn run(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(state.settings.frame_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut poller = state.poller.subscribe();
    loop {
        interval.tick().await;
        if *poller.borrow_and_update() == PollerState::Stopped {
            break;
        }
        frame(&state).await;
    }
    info!("Animation loop stopped");
}

pub async fn frame(state: &AppState) {
    let now = state.now();
    let mut session = state.session.write().await;
    while let Some(batch) = state.queue.pop() {
        if batch.route_name.as_ref() != session.route_name() {
            debug!("Dropping stale batch for route {}", batch.route_name);
            continue;
        }
        session.apply_fixes(&batch.fixes, now);
    }
    let frames = session.tick(now);
    drop(session);

    if frames.is_empty() {
        return;
    }
    trace!("Emitting {} frames", frames.len());
    // No subscribers is fine, the frames are still readable through the session
    let _ = state.frames.send(frames.into());
}
