use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::DirectionConfig, repository::Repository};

/// The two canonical travel directions along a route.
/// Raw feeds encode them as `0` (inbound) and `1` (outbound).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// Parses a raw direction code. Anything other than 0 or 1 is rejected.
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Inbound),
            1 => Some(Self::Outbound),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Inbound => 0,
            Self::Outbound => 1,
        }
    }

    pub(crate) const fn index(self) -> usize {
        self.code() as usize
    }

    pub const fn opposite(self) -> Self {
        match self {
            Self::Inbound => Self::Outbound,
            Self::Outbound => Self::Inbound,
        }
    }
}

/// One stop's position within one route variant's travel order.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStop {
    pub stop_id: Arc<str>,
    pub order: u32,
    pub direction: Direction,
}

#[derive(Debug, Clone)]
struct VariantInfo {
    id: Arc<str>,
    /// The stop list serves both directions.
    mixed: bool,
    /// Direction implied by the variant's position among its siblings.
    fallback: Option<Direction>,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    variant: usize,
    order: u32,
    direction: Direction,
}

/// Resolves the travel direction of a vehicle from the stop it last reported.
///
/// A resolver is bound to one route name and built from scratch for it; when the
/// selected route changes the caller builds a new one instead of patching this one.
#[derive(Debug, Clone, Default)]
pub struct DirectionResolver {
    route_name: Arc<str>,
    variants: Box<[VariantInfo]>,
    stop_lookup: HashMap<Arc<str>, Box<[Candidate]>>,
    active: HashSet<Arc<str>>,
    always_outbound: HashSet<Arc<str>>,
}

impl DirectionResolver {
    /// Builds a resolver from `(variant id, stop sequence)` pairs, in variant order.
    pub fn new<I>(route_name: &str, variants: I, config: &DirectionConfig) -> Self
    where
        I: IntoIterator<Item = (Arc<str>, Vec<RouteStop>)>,
    {
        let variants: Vec<_> = variants.into_iter().collect();
        let sibling_fallback = variants.len() == 2;

        let mut stop_lookup: HashMap<Arc<str>, Vec<Candidate>> = HashMap::new();
        let infos: Vec<VariantInfo> = variants
            .iter()
            .enumerate()
            .map(|(variant, (id, stops))| {
                let mut seen = [false; 2];
                stops.iter().for_each(|stop| {
                    seen[stop.direction.index()] = true;
                    stop_lookup
                        .entry(stop.stop_id.trim().into())
                        .or_default()
                        .push(Candidate {
                            variant,
                            order: stop.order,
                            direction: stop.direction,
                        });
                });
                // Two siblings are assumed to be listed outbound first
                let fallback = sibling_fallback.then_some(if variant == 0 {
                    Direction::Outbound
                } else {
                    Direction::Inbound
                });
                VariantInfo {
                    id: id.clone(),
                    mixed: seen[0] && seen[1],
                    fallback,
                }
            })
            .collect();

        Self {
            route_name: route_name.into(),
            variants: infos.into(),
            stop_lookup: stop_lookup
                .into_iter()
                .map(|(key, value)| (key, value.into()))
                .collect(),
            active: HashSet::new(),
            always_outbound: config
                .always_outbound
                .iter()
                .map(|id| id.trim().into())
                .collect(),
        }
    }

    /// Builds a resolver for every variant the repository knows under `route_name`.
    /// Unknown routes give an empty resolver that never resolves anything.
    pub fn for_route(repository: &Repository, route_name: &str, config: &DirectionConfig) -> Self {
        let variants = repository
            .variants_by_route_name(route_name)
            .unwrap_or_default()
            .into_iter()
            .map(|variant| (variant.id.clone(), variant.stops.to_vec()));
        Self::new(route_name, variants, config)
    }

    pub fn route_name(&self) -> &str {
        &self.route_name
    }

    /// False until stop sequences for the route have been loaded.
    pub fn is_ready(&self) -> bool {
        !self.stop_lookup.is_empty()
    }

    /// Records which variants currently report vehicles. Replaces the previous set.
    pub fn set_active_variants<I, S>(&mut self, variant_ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.active = variant_ids
            .into_iter()
            .map(|id| Arc::from(id.as_ref().trim()))
            .collect();
    }

    /// Resolves the direction of a vehicle last seen at `stop_id`.
    ///
    /// Returns None when the data is not loaded or nothing matches. None means
    /// unknown and must not be read as inbound.
    pub fn resolve(
        &self,
        stop_id: &str,
        order: Option<u32>,
        variant_id: Option<&str>,
    ) -> Option<Direction> {
        let stop_id = stop_id.trim();
        if self.always_outbound.contains(stop_id) {
            return Some(Direction::Outbound);
        }
        let candidates = self.stop_lookup.get(stop_id)?;

        let narrowed: Vec<&Candidate> = match variant_id.map(str::trim) {
            Some(variant_id) => candidates
                .iter()
                .filter(|c| &*self.variants[c.variant].id == variant_id)
                .collect(),
            None => candidates
                .iter()
                .filter(|c| self.active.contains(&self.variants[c.variant].id))
                .collect(),
        };
        let pool: Vec<&Candidate> = if narrowed.is_empty() {
            candidates.iter().collect()
        } else {
            narrowed
        };

        let direction = match order {
            Some(order) => {
                let winner = pool
                    .iter()
                    .find(|c| c.order == order)
                    .or_else(|| {
                        pool.iter()
                            .min_by_key(|c| (c.order.abs_diff(order), c.order))
                    })?;
                Some(self.effective_direction(winner))
            }
            None => {
                let mut directions = pool.iter().map(|c| self.effective_direction(c));
                let first = directions.next()?;
                directions.all(|d| d == first).then_some(first)
            }
        };
        debug!(
            "Resolved stop {stop_id} (order {order:?}) on route {} to {direction:?}",
            self.route_name
        );
        direction
    }

    fn effective_direction(&self, candidate: &Candidate) -> Direction {
        let variant = &self.variants[candidate.variant];
        if variant.mixed {
            return candidate.direction;
        }
        variant.fallback.unwrap_or(candidate.direction)
    }
}

#[cfg(test)]
fn stops(entries: &[(&str, u32, Direction)]) -> Vec<RouteStop> {
    entries
        .iter()
        .map(|(id, order, direction)| RouteStop {
            stop_id: (*id).into(),
            order: *order,
            direction: *direction,
        })
        .collect()
}

#[test]
fn direction_codes() {
    assert_eq!(Direction::from_code(0), Some(Direction::Inbound));
    assert_eq!(Direction::from_code(1), Some(Direction::Outbound));
    assert_eq!(Direction::from_code(2), None);
    assert_eq!(Direction::from_code(-1), None);
    assert_eq!(Direction::Outbound.opposite(), Direction::Inbound);
}

#[test]
fn mixed_variant_uses_stop_direction() {
    use Direction::*;
    let resolver = DirectionResolver::new(
        "34",
        [(
            Arc::from("V1"),
            stops(&[("a", 1, Outbound), ("b", 2, Outbound), ("b", 4, Inbound), ("a", 6, Inbound)]),
        )],
        &DirectionConfig::default(),
    );
    assert_eq!(resolver.resolve("b", Some(2), None), Some(Outbound));
    assert_eq!(resolver.resolve("b", Some(4), None), Some(Inbound));
    // closest order, ties prefer the smaller order
    assert_eq!(resolver.resolve("a", Some(5), None), Some(Inbound));
    assert_eq!(resolver.resolve("b", Some(3), None), Some(Outbound));
    assert_eq!(resolver.resolve("b", None, None), None);
    assert_eq!(resolver.resolve("missing", Some(1), None), None);
}

#[test]
fn override_list_wins() {
    let config = DirectionConfig {
        always_outbound: vec!["depot".into()],
    };
    let resolver = DirectionResolver::new("34", std::iter::empty(), &config);
    assert!(!resolver.is_ready());
    assert_eq!(resolver.resolve(" depot ", None, None), Some(Direction::Outbound));
}
