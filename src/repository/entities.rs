use std::sync::Arc;

use crate::{direction::RouteStop, shared::geo::Coordinate};

/// A physical stop location shared by every route variant that serves it.
#[derive(Debug, Default, Clone)]
pub struct Station {
    /// The global internal index used for O(1) array lookups in the repository.
    pub index: u32,
    /// The unique external identifier.
    pub id: Arc<str>,
    /// The display name of the station.
    pub name: Arc<str>,
    /// Short number printed on the stop sign, empty when unknown.
    pub number: Arc<str>,
    pub coordinate: Coordinate,
}

/// One physical travel pattern of a route. A route name usually has one or two.
#[derive(Debug, Default, Clone)]
pub struct RouteVariant {
    pub index: u32,
    pub id: Arc<str>,
    /// The public route number, shared by sibling variants.
    pub route_name: Arc<str>,
    /// Stops in travel order.
    pub stops: Box<[RouteStop]>,
}

impl RouteVariant {
    pub fn serves(&self, stop_id: &str) -> bool {
        self.stops.iter().any(|stop| &*stop.stop_id == stop_id)
    }
}
