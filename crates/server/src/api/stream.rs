use std::sync::Arc;

use crate::{dto::VehicleDto, state::AppState};
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, stream};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

/// Server sent events, one `frames` event per animation tick that moved a marker.
pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let receiver = state.frames.subscribe();
    let events = stream::unfold(receiver, |mut receiver| async move {
        loop {
            match receiver.recv().await {
                Ok(frames) => {
                    let result: Vec<VehicleDto> = frames.iter().map(VehicleDto::from).collect();
                    let event = Event::default().event("frames").json_data(&result);
                    return Some((event, receiver));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Stream subscriber skipped {skipped} frame batches");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
