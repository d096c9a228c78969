//! Detects route geometries whose outbound and inbound halves are labeled the wrong way
//! round, by checking which half each direction's stops actually sit on.

use tracing::debug;

use crate::{
    config::SwapConfig,
    direction::Direction,
    polyline::{Polyline, RoutePolylines},
    shared::geo::Coordinate,
};

/// Mean squared distance (m²) of each stop group to each labeled polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapScores {
    pub outbound_on_outbound: f64,
    pub outbound_on_inbound: f64,
    pub inbound_on_inbound: f64,
    pub inbound_on_outbound: f64,
}

impl SwapScores {
    /// Scores the fit of `stops` against both polylines.
    ///
    /// At most `config.sample_cap` stops per direction are used, picked with a uniform
    /// stride. Returns None when either direction has no stops or either polyline has
    /// no segments, there is no evidence to compare in that case.
    pub fn measure(
        stops: &[(Coordinate, Direction)],
        polylines: &RoutePolylines,
        config: &SwapConfig,
    ) -> Option<Self> {
        let outbound_stops = sample(stops, Direction::Outbound, config.sample_cap);
        let inbound_stops = sample(stops, Direction::Inbound, config.sample_cap);

        let ((outbound_on_outbound, outbound_on_inbound), (inbound_on_inbound, inbound_on_outbound)) =
            rayon::join(
                || {
                    (
                        mean_squared_error(&outbound_stops, &polylines.outbound),
                        mean_squared_error(&outbound_stops, &polylines.inbound),
                    )
                },
                || {
                    (
                        mean_squared_error(&inbound_stops, &polylines.inbound),
                        mean_squared_error(&inbound_stops, &polylines.outbound),
                    )
                },
            );

        Some(Self {
            outbound_on_outbound: outbound_on_outbound?,
            outbound_on_inbound: outbound_on_inbound?,
            inbound_on_inbound: inbound_on_inbound?,
            inbound_on_outbound: inbound_on_outbound?,
        })
    }

    /// Both stop groups have to fit the opposite polyline clearly better than their own.
    /// One sided evidence is more likely sampling noise than a mislabeled route.
    pub fn needs_swap(&self, ratio: f64) -> bool {
        let outbound_prefers_inbound = self.outbound_on_inbound <= ratio * self.outbound_on_outbound
            && self.outbound_on_inbound < self.outbound_on_outbound;
        let inbound_prefers_outbound = self.inbound_on_outbound <= ratio * self.inbound_on_inbound
            && self.inbound_on_outbound < self.inbound_on_inbound;
        outbound_prefers_inbound && inbound_prefers_outbound
    }
}

/// True when the polylines should be swapped to match the stop sequence.
pub fn needs_swap(
    stops: &[(Coordinate, Direction)],
    polylines: &RoutePolylines,
    config: &SwapConfig,
) -> bool {
    match SwapScores::measure(stops, polylines, config) {
        Some(scores) => {
            let swap = scores.needs_swap(config.ratio);
            debug!("Swap scores {scores:?}, swap: {swap}");
            swap
        }
        None => false,
    }
}

fn sample(stops: &[(Coordinate, Direction)], direction: Direction, cap: usize) -> Vec<Coordinate> {
    let matching: Vec<Coordinate> = stops
        .iter()
        .filter(|(_, d)| *d == direction)
        .map(|(coordinate, _)| *coordinate)
        .collect();
    if matching.len() <= cap {
        return matching;
    }
    (0..cap)
        .map(|i| matching[i * matching.len() / cap])
        .collect()
}

fn mean_squared_error(points: &[Coordinate], polyline: &Polyline) -> Option<f64> {
    if points.is_empty() || polyline.is_degenerate() {
        return None;
    }
    let total: f64 = points
        .iter()
        .map(|point| polyline.nearest_point(point, None).distance.as_meters().powi(2))
        .sum();
    Some(total / points.len() as f64)
}

#[test]
fn sample_uses_uniform_stride() {
    let stops: Vec<_> = (0..10)
        .map(|i| (Coordinate::new(i as f64, 0.0), Direction::Outbound))
        .collect();
    let sampled = sample(&stops, Direction::Outbound, 4);
    let latitudes: Vec<f64> = sampled.iter().map(|c| c.latitude).collect();
    assert_eq!(latitudes, vec![0.0, 2.0, 5.0, 7.0]);
    assert!(sample(&stops, Direction::Inbound, 4).is_empty());
}

#[test]
fn identical_fit_is_not_a_swap() {
    let scores = SwapScores {
        outbound_on_outbound: 0.0,
        outbound_on_inbound: 0.0,
        inbound_on_inbound: 0.0,
        inbound_on_outbound: 0.0,
    };
    assert!(!scores.needs_swap(0.9));
}

#[test]
fn one_sided_evidence_is_not_a_swap() {
    let scores = SwapScores {
        outbound_on_outbound: 100.0,
        outbound_on_inbound: 10.0,
        inbound_on_inbound: 100.0,
        inbound_on_outbound: 95.0,
    };
    assert!(!scores.needs_swap(0.9));
}
