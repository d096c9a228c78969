use std::{sync::Arc, time::Instant};

use crossbeam_queue::SegQueue;
use snapline::prelude::*;
use tokio::sync::{RwLock, broadcast, watch};

use crate::{
    live::LiveClient,
    poller::{FixBatch, PollerState},
    settings::Settings,
    statics::StaticData,
};

pub struct AppState {
    pub settings: Settings,
    pub statics: StaticData,
    pub live: Option<LiveClient>,
    pub session: RwLock<RouteSession>,
    /// Fix batches in arrival order, drained by the animation loop.
    pub queue: SegQueue<FixBatch>,
    pub poller: watch::Sender<PollerState>,
    pub frames: broadcast::Sender<Arc<[VehicleFrame]>>,
    started: Instant,
}

impl AppState {
    pub fn new(
        settings: Settings,
        statics: StaticData,
        live: Option<LiveClient>,
        session: RouteSession,
        poller: watch::Sender<PollerState>,
    ) -> Self {
        let (frames, _) = broadcast::channel(64);
        Self {
            settings,
            statics,
            live,
            session: RwLock::new(session),
            queue: SegQueue::new(),
            poller,
            frames,
            started: Instant::now(),
        }
    }

    /// Milliseconds since start up, the clock every animation runs on.
    pub fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.started.elapsed().as_millis() as u64)
    }
}
