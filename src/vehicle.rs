use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::shared::geo::Coordinate;

/// One reported observation of a vehicle. Replaced wholesale on every poll.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleFix {
    pub vehicle_id: Arc<str>,
    pub position: Coordinate,
    /// Last stop the vehicle reported.
    pub stop_id: Option<Arc<str>>,
    /// Sequence order of that stop within the variant.
    pub order: Option<u32>,
    pub variant_id: Option<Arc<str>>,
    pub observed_at: Option<NaiveDateTime>,
}

impl VehicleFix {
    pub fn new(vehicle_id: &str, position: Coordinate) -> Self {
        Self {
            vehicle_id: vehicle_id.trim().into(),
            position,
            stop_id: None,
            order: None,
            variant_id: None,
            observed_at: None,
        }
    }

    pub fn at_stop(mut self, stop_id: &str, order: Option<u32>) -> Self {
        self.stop_id = Some(stop_id.trim().into());
        self.order = order;
        self
    }

    pub fn on_variant(mut self, variant_id: &str) -> Self {
        self.variant_id = Some(variant_id.trim().into());
        self
    }

    pub fn observed_at(mut self, observed_at: NaiveDateTime) -> Self {
        self.observed_at = Some(observed_at);
        self
    }
}
