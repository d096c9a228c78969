use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use snapline::prelude::*;

#[derive(Debug, Clone, Deserialize)]
pub struct RouteRequest {
    pub route_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantDto {
    pub id: String,
    pub stops: usize,
    pub has_geometry: bool,
    pub swapped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDto {
    pub route_name: String,
    pub last_updated: Option<NaiveDateTime>,
    pub variants: Vec<VariantDto>,
}

impl RouteDto {
    pub fn from(route_name: &str, repo: &Repository) -> Self {
        let variants = repo
            .variants_by_route_name(route_name)
            .unwrap_or_default()
            .into_iter()
            .map(|variant| {
                let shape = repo.shape_by_variant_id(&variant.id);
                VariantDto {
                    id: variant.id.to_string(),
                    stops: variant.stops.len(),
                    has_geometry: shape.is_some(),
                    swapped: shape.is_some_and(|shape| shape.swapped),
                }
            })
            .collect();
        Self {
            route_name: route_name.to_string(),
            last_updated: repo.last_updated,
            variants,
        }
    }
}
