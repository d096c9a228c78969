use serde::{Deserialize, Serialize};
use snapline::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleDto {
    pub id: String,
    pub coordinate: Coordinate,
    /// Heading in degrees clockwise from north.
    pub angle: f64,
    pub direction: Option<Direction>,
    pub snapped: bool,
}

impl VehicleDto {
    pub fn from(frame: &VehicleFrame) -> Self {
        Self {
            id: frame.vehicle_id.to_string(),
            coordinate: frame.position,
            angle: frame.angle,
            direction: frame.direction,
            snapped: frame.snapped,
        }
    }
}
