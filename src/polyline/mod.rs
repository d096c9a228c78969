pub mod transform;

pub use transform::*;

use std::{
    ops::{Deref, RangeInclusive},
    sync::Arc,
};

use crate::shared::geo::{Coordinate, Distance, bearing, segment_projection};

/// Narrows a polyline search to `index ± radius` segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchHint {
    pub index: usize,
    pub radius: usize,
}

impl SearchHint {
    pub const fn new(index: usize, radius: usize) -> Self {
        Self { index, radius }
    }
}

/// Result of projecting a point onto a polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Closest point found on the polyline.
    pub position: Coordinate,
    /// Bearing of the winning segment in degrees.
    pub bearing: f64,
    /// Index of the winning segment, segment `i` runs from vertex `i` to `i + 1`.
    /// Always 0 for degenerate polylines, which is not a real match.
    pub segment_index: usize,
    /// Normalized position within the winning segment, `[0, 1]`.
    pub offset: f64,
    /// Distance from the query point to `position`.
    pub distance: Distance,
    /// Set when the polyline had fewer than two points.
    pub degenerate: bool,
}

impl Projection {
    /// Orders two projections by how far along the polyline they are.
    /// Offsets closer than `epsilon` on the same segment count as equal.
    pub fn is_behind(&self, other: &Projection, epsilon: f64) -> bool {
        self.segment_index < other.segment_index
            || (self.segment_index == other.segment_index && self.offset < other.offset - epsilon)
    }

    /// Same segment and offsets no more than `epsilon` apart.
    pub fn is_level_with(&self, other: &Projection, epsilon: f64) -> bool {
        self.segment_index == other.segment_index && (self.offset - other.offset).abs() <= epsilon
    }
}

/// Geographic extent, serialized in GeoJSON order `[west, south, east, north]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south_west: Coordinate,
    pub north_east: Coordinate,
}

impl BoundingBox {
    pub fn from_coordinates<'a, I>(coordinates: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coordinate>,
    {
        let mut iter = coordinates.into_iter();
        let first = *iter.next()?;
        let mut bbox = Self {
            south_west: first,
            north_east: first,
        };
        for coord in iter {
            bbox.south_west.latitude = bbox.south_west.latitude.min(coord.latitude);
            bbox.south_west.longitude = bbox.south_west.longitude.min(coord.longitude);
            bbox.north_east.latitude = bbox.north_east.latitude.max(coord.latitude);
            bbox.north_east.longitude = bbox.north_east.longitude.max(coord.longitude);
        }
        Some(bbox)
    }

    pub fn from_geojson(values: &[f64]) -> Option<Self> {
        match values {
            [west, south, east, north] => Some(Self {
                south_west: Coordinate::new(*south, *west),
                north_east: Coordinate::new(*north, *east),
            }),
            _ => None,
        }
    }

    pub fn to_geojson(&self) -> [f64; 4] {
        [
            self.south_west.longitude,
            self.south_west.latitude,
            self.north_east.longitude,
            self.north_east.latitude,
        ]
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.south_west.latitude..=self.north_east.latitude).contains(&coordinate.latitude)
            && (self.south_west.longitude..=self.north_east.longitude)
                .contains(&coordinate.longitude)
    }
}

/// One directed path. Cheap to clone, the points are shared.
#[derive(Debug, Clone, PartialEq)]
pub struct Polyline(Arc<[Coordinate]>);

impl Default for Polyline {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl From<Vec<Coordinate>> for Polyline {
    fn from(value: Vec<Coordinate>) -> Self {
        Self(value.into())
    }
}

impl From<&[Coordinate]> for Polyline {
    fn from(value: &[Coordinate]) -> Self {
        Self(value.into())
    }
}

impl FromIterator<Coordinate> for Polyline {
    fn from_iter<T: IntoIterator<Item = Coordinate>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Deref for Polyline {
    type Target = [Coordinate];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Polyline {
    pub fn points(&self) -> &[Coordinate] {
        &self.0
    }

    /// Polylines with fewer than two points have no segments.
    pub fn is_degenerate(&self) -> bool {
        self.0.len() < 2
    }

    pub fn segment_count(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    pub fn segment_bearing(&self, index: usize) -> Option<f64> {
        let a = self.0.get(index)?;
        let b = self.0.get(index + 1)?;
        Some(bearing(a, b))
    }

    /// Total length along the great circle.
    pub fn length(&self) -> Distance {
        self.0
            .windows(2)
            .fold(Distance::ZERO, |acc, pair| {
                acc + pair[0].haversine_distance(&pair[1])
            })
    }

    /// Running distance from the first point to each point, same length as the polyline.
    pub fn cumulative_lengths(&self) -> Vec<Distance> {
        cumulative_lengths(&self.0)
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_coordinates(self.0.iter())
    }

    /// Index of the vertex closest to `point`, None when empty.
    pub fn nearest_vertex(&self, point: &Coordinate) -> Option<usize> {
        self.0
            .iter()
            .enumerate()
            .map(|(i, vertex)| (i, vertex.approx_distance_squared(point)))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((i, d)),
            })
            .map(|(i, _)| i)
    }

    /// Segment range searched for a given hint. Without a hint every segment is searched.
    /// Must only be called on non degenerate polylines.
    fn window(&self, hint: Option<SearchHint>) -> RangeInclusive<usize> {
        let last = self.segment_count() - 1;
        match hint {
            None => 0..=last,
            Some(hint) => {
                let center = hint.index.min(last);
                let start = center.saturating_sub(hint.radius);
                let end = center.saturating_add(hint.radius).min(last);
                start..=end
            }
        }
    }

    /// Finds the closest point on the polyline to `point`.
    ///
    /// With a hint only the segments within the hint's radius are scanned, which turns an
    /// O(n) search into O(radius) for long routes. Ties keep the first segment found.
    ///
    /// An empty polyline returns `point` itself and a single point polyline returns
    /// that point, both flagged as degenerate.
    pub fn nearest_point(&self, point: &Coordinate, hint: Option<SearchHint>) -> Projection {
        match self.0.len() {
            0 => {
                return Projection {
                    position: *point,
                    bearing: 0.0,
                    segment_index: 0,
                    offset: 0.0,
                    distance: Distance::ZERO,
                    degenerate: true,
                };
            }
            1 => {
                return Projection {
                    position: self.0[0],
                    bearing: 0.0,
                    segment_index: 0,
                    offset: 0.0,
                    distance: point.approx_distance(&self.0[0]),
                    degenerate: true,
                };
            }
            _ => {}
        }

        let mut best: Option<(usize, Coordinate, f64, f64)> = None;
        for i in self.window(hint) {
            let (candidate, t) = segment_projection(point, &self.0[i], &self.0[i + 1]);
            let distance_sq = point.approx_distance_squared(&candidate);
            if best.is_none_or(|(_, _, _, best_sq)| distance_sq < best_sq) {
                best = Some((i, candidate, t, distance_sq));
            }
        }

        // The window is never empty for two or more points
        let (segment_index, position, offset, distance_sq) =
            best.unwrap_or((0, self.0[0], 0.0, point.approx_distance_squared(&self.0[0])));
        Projection {
            position,
            bearing: bearing(&self.0[segment_index], &self.0[segment_index + 1]),
            segment_index,
            offset,
            distance: Distance::from_meters(distance_sq.sqrt()),
            degenerate: false,
        }
    }
}

/// Running distance along `points`, starting at zero.
pub(crate) fn cumulative_lengths(points: &[Coordinate]) -> Vec<Distance> {
    let mut lengths = Vec::with_capacity(points.len());
    let mut total = Distance::ZERO;
    for (i, point) in points.iter().enumerate() {
        if i > 0 {
            total = total + points[i - 1].approx_distance(point);
        }
        lengths.push(total);
    }
    lengths
}

#[cfg(test)]
fn zigzag() -> Polyline {
    (0..40)
        .map(|i| {
            let lat = 37.30 + i as f64 * 0.001;
            let lon = if i % 2 == 0 { 127.90 } else { 127.9005 };
            Coordinate::new(lat, lon)
        })
        .collect()
}

#[test]
fn empty_polyline_returns_query_point() {
    let point = Coordinate::new(37.0, 127.0);
    let projection = Polyline::default().nearest_point(&point, None);
    assert!(projection.degenerate);
    assert_eq!(projection.position, point);
    assert_eq!(projection.segment_index, 0);
}

#[test]
fn single_point_polyline_returns_that_point() {
    let only = Coordinate::new(37.0, 127.0);
    let polyline = Polyline::from(vec![only]);
    let projection = polyline.nearest_point(&Coordinate::new(37.001, 127.0), None);
    assert!(projection.degenerate);
    assert_eq!(projection.position, only);
    assert!((projection.distance.as_meters() - 111.32).abs() < 0.1);
}

#[test]
fn projects_onto_interior_of_segment() {
    let polyline = Polyline::from(vec![
        Coordinate::new(37.0, 127.0),
        Coordinate::new(37.0, 127.01),
        Coordinate::new(37.01, 127.01),
    ]);
    let projection = polyline.nearest_point(&Coordinate::new(37.0002, 127.005), None);
    assert!(!projection.degenerate);
    assert_eq!(projection.segment_index, 0);
    assert!((projection.offset - 0.5).abs() < 1e-6);
    assert!((projection.position.latitude - 37.0).abs() < 1e-12);
    assert!((projection.bearing - 90.0).abs() < 0.01);
}

#[test]
fn hinted_search_matches_full_scan() {
    let polyline = zigzag();
    let point = Coordinate::new(37.3205, 127.9003);
    let full = polyline.nearest_point(&point, None);
    let windowed = polyline.nearest_point(&point, Some(SearchHint::new(full.segment_index + 3, 5)));
    assert_eq!(full, windowed);
}

#[test]
fn hint_outside_range_is_clamped() {
    let polyline = zigzag();
    let point = *polyline.last().unwrap();
    let projection = polyline.nearest_point(&point, Some(SearchHint::new(10_000, 2)));
    assert_eq!(projection.segment_index, polyline.segment_count() - 1);
}

#[test]
fn nearest_vertex_picks_first_on_tie() {
    let a = Coordinate::new(37.0, 127.0);
    let polyline = Polyline::from(vec![a, Coordinate::new(37.1, 127.0), a]);
    assert_eq!(polyline.nearest_vertex(&a), Some(0));
    assert_eq!(Polyline::default().nearest_vertex(&a), None);
}

#[test]
fn bounding_box_round_trips_geojson_order() {
    let polyline = zigzag();
    let bbox = polyline.bounding_box().unwrap();
    assert_eq!(BoundingBox::from_geojson(&bbox.to_geojson()), Some(bbox));
    assert!(bbox.contains(&polyline[7]));
}
