use crate::{
    polyline::{Polyline, Projection, cumulative_lengths},
    shared::geo::{Coordinate, Distance, bearing},
};

/// Waypoints of one animation, with the running distance to each of them.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationPath {
    points: Box<[Coordinate]>,
    /// Non decreasing, one entry per point.
    cumulative: Box<[Distance]>,
    follows_polyline: bool,
}

impl AnimationPath {
    /// A straight two point path.
    pub fn direct(from: Coordinate, to: Coordinate) -> Self {
        Self::new(vec![from, to], false)
    }

    /// Follows `polyline` from `start` to `end`, passing through every vertex between
    /// the two projected segments. `end` must not be behind `start`.
    pub fn along(polyline: &Polyline, start: &Projection, end: &Projection) -> Self {
        let mut points = Vec::with_capacity(end.segment_index.saturating_sub(start.segment_index) + 2);
        points.push(start.position);
        if end.segment_index > start.segment_index {
            points.extend_from_slice(&polyline[start.segment_index + 1..=end.segment_index]);
        }
        points.push(end.position);
        points.dedup();
        Self::new(points, true)
    }

    fn new(points: Vec<Coordinate>, follows_polyline: bool) -> Self {
        let cumulative = cumulative_lengths(&points);
        Self {
            points: points.into(),
            cumulative: cumulative.into(),
            follows_polyline,
        }
    }

    pub fn points(&self) -> &[Coordinate] {
        &self.points
    }

    pub fn cumulative(&self) -> &[Distance] {
        &self.cumulative
    }

    pub fn follows_polyline(&self) -> bool {
        self.follows_polyline
    }

    pub fn length(&self) -> Distance {
        self.cumulative.last().copied().unwrap_or(Distance::ZERO)
    }

    pub fn end(&self) -> Option<Coordinate> {
        self.points.last().copied()
    }

    /// Point at `fraction` of the path's length and the index of the segment it lies on.
    ///
    /// The segment is found by binary search over the running distances, so the speed
    /// along the path stays constant however unequal the segments are.
    pub fn position_at(&self, fraction: f64) -> Option<(Coordinate, usize)> {
        let first = *self.points.first()?;
        let total = self.length();
        if self.points.len() < 2 || total <= Distance::ZERO {
            return Some((self.end().unwrap_or(first), 0));
        }
        let travelled = total * fraction.clamp(0.0, 1.0);
        let index = self.cumulative.partition_point(|distance| *distance < travelled);
        if index == 0 {
            return Some((first, 0));
        }
        let index = index.min(self.points.len() - 1);
        let segment = index - 1;
        let span = self.cumulative[index] - self.cumulative[segment];
        let t = if span > Distance::ZERO {
            (travelled - self.cumulative[segment]) / span
        } else {
            1.0
        };
        Some((self.points[segment].lerp(&self.points[index], t), segment))
    }

    pub fn segment_bearing(&self, segment: usize) -> Option<f64> {
        Some(bearing(self.points.get(segment)?, self.points.get(segment + 1)?))
    }
}

#[cfg(test)]
fn l_shape() -> AnimationPath {
    // 100 m north, then 300 m east
    let a = Coordinate::new(37.0, 127.0);
    let b = Coordinate::new(37.0 + 100.0 / 111_320.0, 127.0);
    let c = Coordinate::new(
        b.latitude,
        127.0 + 300.0 / (111_320.0 * b.latitude.to_radians().cos()),
    );
    AnimationPath::new(vec![a, b, c], true)
}

#[test]
fn cumulative_distances_are_monotonic() {
    let path = l_shape();
    assert_eq!(path.cumulative().len(), path.points().len());
    assert!(path.cumulative().windows(2).all(|pair| pair[0] <= pair[1]));
    assert!((path.length().as_meters() - 400.0).abs() < 0.5);
}

#[test]
fn position_is_distance_proportional() {
    let path = l_shape();
    let (position, segment) = path.position_at(0.5).unwrap();
    assert_eq!(segment, 1);
    // half of 400 m lies 100 m into the eastbound leg
    let b = path.points()[1];
    assert!((b.approx_distance(&position).as_meters() - 100.0).abs() < 0.5);
    assert_eq!(path.position_at(0.0).unwrap().0, path.points()[0]);
    assert_eq!(path.position_at(1.0).unwrap().0, path.points()[2]);
}

#[test]
fn along_collects_vertices_between_segments() {
    let polyline: Polyline = (0..6)
        .map(|i| Coordinate::new(37.0 + i as f64 * 0.001, 127.0))
        .collect();
    let start = polyline.nearest_point(&Coordinate::new(37.0005, 127.0), None);
    let end = polyline.nearest_point(&Coordinate::new(37.0035, 127.0), None);
    let path = AnimationPath::along(&polyline, &start, &end);
    assert_eq!(path.points().len(), 5);
    assert_eq!(&path.points()[1..4], &polyline[1..=3]);
    assert!(path.follows_polyline());
}
