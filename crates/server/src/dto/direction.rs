use serde::{Deserialize, Serialize};
use snapline::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionDto {
    pub stop_id: String,
    pub order: Option<u32>,
    pub direction: Option<Direction>,
}
