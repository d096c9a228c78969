use std::{
    cmp,
    fmt::Display,
    ops::{Add, Div, Mul, Sub},
};

use serde::{Deserialize, Serialize};

pub(crate) const EARTH_RADIUS: Distance = Distance::from_meters(6_371_008.8);
pub(crate) const METERS_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Distance(f64);

impl PartialEq for Distance {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        self.0.partial_cmp(&other.0)
    }
}

impl Add for Distance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Distance {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<f64> for Distance {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Div for Distance {
    type Output = f64;
    fn div(self, rhs: Self) -> Self::Output {
        self.0 / rhs.0
    }
}

impl From<f64> for Distance {
    fn from(value: f64) -> Self {
        Self::from_meters(value)
    }
}

impl Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{:.1}m", self.0))
    }
}

impl Distance {
    pub const ZERO: Distance = Distance(0.0);

    pub const fn from_meters(distance: f64) -> Self {
        Self(distance)
    }

    pub const fn from_kilometers(distance: f64) -> Self {
        Self(distance * 1000.0)
    }

    pub const fn as_meters(&self) -> f64 {
        self.0
    }

    pub const fn as_kilometers(&self) -> f64 {
        self.0 / 1000.0
    }
}

/// A WGS84 position, always latitude first.
///
/// Route artefacts on disk are GeoJSON and therefore longitude first, use
/// [`Coordinate::from_lon_lat`] when reading them.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("{}, {}", self.latitude, self.longitude))
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((latitude, longitude): (f64, f64)) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<Coordinate> for (f64, f64) {
    fn from(value: Coordinate) -> Self {
        (value.latitude, value.longitude)
    }
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Converts a GeoJSON `[longitude, latitude]` pair.
    pub const fn from_lon_lat(pair: [f64; 2]) -> Self {
        Self {
            latitude: pair[1],
            longitude: pair[0],
        }
    }

    pub const fn to_lon_lat(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }

    /// Great circle distance.
    pub fn haversine_distance(&self, coord: &Self) -> Distance {
        let dist_lat = f64::to_radians(coord.latitude - self.latitude);
        let dist_lon = f64::to_radians(coord.longitude - self.longitude);
        let a = f64::powi(f64::sin(dist_lat / 2.0), 2)
            + f64::cos(f64::to_radians(self.latitude))
                * f64::cos(f64::to_radians(coord.latitude))
                * f64::sin(dist_lon / 2.0)
                * f64::sin(dist_lon / 2.0);
        let c = 2.0 * f64::atan2(f64::sqrt(a), f64::sqrt(1.0 - a));
        Distance::from_meters(EARTH_RADIUS.as_meters() * c)
    }

    pub fn haversine_km(&self, coord: &Self) -> f64 {
        self.haversine_distance(coord).as_kilometers()
    }

    /// Planar distance with a single cosine correction at the mean latitude.
    /// Good enough below ~10km and a lot cheaper than haversine.
    pub fn approx_distance(&self, coord: &Self) -> Distance {
        let (dx, dy) = self.offset_to(coord);
        Distance::from_meters(f64::sqrt(dx * dx + dy * dy))
    }

    /// Squared planar distance in m², skips the square root for comparisons.
    pub(crate) fn approx_distance_squared(&self, coord: &Self) -> f64 {
        let (dx, dy) = self.offset_to(coord);
        dx * dx + dy * dy
    }

    /// East/north offset in meters from `self` to `coord`.
    fn offset_to(&self, coord: &Self) -> (f64, f64) {
        let mean_lat = f64::to_radians((self.latitude + coord.latitude) / 2.0);
        let dx = (coord.longitude - self.longitude) * f64::cos(mean_lat) * METERS_PER_DEGREE;
        let dy = (coord.latitude - self.latitude) * METERS_PER_DEGREE;
        (dx, dy)
    }

    /// Linear interpolation in degree space, fine for the short spans between polyline vertices.
    pub fn lerp(&self, to: &Self, t: f64) -> Self {
        Self {
            latitude: self.latitude + (to.latitude - self.latitude) * t,
            longitude: self.longitude + (to.longitude - self.longitude) * t,
        }
    }

    pub fn bearing_to(&self, coord: &Self) -> f64 {
        bearing(self, coord)
    }
}

/// Forward azimuth from `from` to `to` in degrees, `[0, 360)` with 0 north and 90 east.
/// Identical points have no direction and return 0.
pub fn bearing(from: &Coordinate, to: &Coordinate) -> f64 {
    if from == to {
        return 0.0;
    }
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let delta_lon = (to.longitude - from.longitude).to_radians();

    let x = delta_lon.sin() * lat2.cos();
    let y = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    normalize_angle(x.atan2(y).to_degrees())
}

/// Wraps any angle into `[0, 360)`.
pub fn normalize_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Signed difference `to - from` along the shorter arc, in `(-180, 180]`.
pub fn angle_delta(from: f64, to: f64) -> f64 {
    let delta = (to - from).rem_euclid(360.0);
    if delta > 180.0 { delta - 360.0 } else { delta }
}

/// Interpolates between two headings along the shorter arc.
/// `progress` is not clamped, callers are expected to keep it in `[0, 1]`.
pub fn interpolate_angle(from: f64, to: f64, progress: f64) -> f64 {
    normalize_angle(from + angle_delta(from, to) * progress)
}

/// Closest point to `point` on the segment `a`-`b` together with the
/// normalized offset `t` of that point along the segment.
/// Works in a local equirectangular frame anchored at `a`.
pub(crate) fn segment_projection(
    point: &Coordinate,
    a: &Coordinate,
    b: &Coordinate,
) -> (Coordinate, f64) {
    if a == b {
        return (*a, 0.0);
    }
    let scale = f64::cos(a.latitude.to_radians());
    let abx = (b.longitude - a.longitude) * scale;
    let aby = b.latitude - a.latitude;
    let apx = (point.longitude - a.longitude) * scale;
    let apy = point.latitude - a.latitude;

    let length_sq = abx * abx + aby * aby;
    if length_sq == 0.0 {
        return (*a, 0.0);
    }
    let t = ((apx * abx + apy * aby) / length_sq).clamp(0.0, 1.0);
    (a.lerp(b, t), t)
}

/// Closest point on the segment `a`-`b`. A zero length segment returns `a`.
pub fn project_onto_segment(point: &Coordinate, a: &Coordinate, b: &Coordinate) -> Coordinate {
    segment_projection(point, a, b).0
}

#[test]
fn distance_test() {
    let coord_a = Coordinate {
        latitude: 48.85800943005911,
        longitude: 2.3514350059357927,
    };

    let coord_b = Coordinate {
        latitude: 51.5052389927712,
        longitude: -0.12495407345099824,
    };
    let d = coord_a.haversine_distance(&coord_b);
    assert!((d.as_kilometers() - 343.1).abs() < 0.5);
}

#[test]
fn approx_matches_haversine_on_short_spans() {
    let a = Coordinate::new(37.3422, 127.9202);
    let b = Coordinate::new(37.3491, 127.9307);
    let exact = a.haversine_distance(&b).as_meters();
    let approx = a.approx_distance(&b).as_meters();
    assert!((exact - approx).abs() / exact < 0.005);
}

#[test]
fn distance_eq_test() {
    let dist_a = Distance::from_meters(1000.0);
    let dist_b = Distance::from_kilometers(1.0);
    assert_eq!(dist_a, dist_b)
}

#[test]
fn distance_cmp_test() {
    let dist_a = Distance::from_meters(1000.0);
    let dist_b = Distance::from_kilometers(0.5);
    assert!(dist_a > dist_b)
}

#[test]
fn bearing_cardinal_directions() {
    let origin = Coordinate::new(37.0, 127.0);
    assert!(bearing(&origin, &Coordinate::new(37.01, 127.0)).abs() < 1e-6);
    assert!((bearing(&origin, &Coordinate::new(37.0, 127.01)) - 90.0).abs() < 0.01);
    assert!((bearing(&origin, &Coordinate::new(36.99, 127.0)) - 180.0).abs() < 1e-6);
    assert!((bearing(&origin, &Coordinate::new(37.0, 126.99)) - 270.0).abs() < 0.01);
    assert_eq!(bearing(&origin, &origin), 0.0);
}

#[test]
fn interpolate_angle_wraps_short_way() {
    assert!(interpolate_angle(350.0, 10.0, 0.5).abs() < 1e-9);
    assert!((interpolate_angle(10.0, 350.0, 0.25) - 5.0).abs() < 1e-9);
    assert!((interpolate_angle(90.0, 180.0, 0.5) - 135.0).abs() < 1e-9);
}

#[test]
fn normalize_angle_range() {
    assert_eq!(normalize_angle(360.0), 0.0);
    assert_eq!(normalize_angle(-90.0), 270.0);
    assert_eq!(normalize_angle(725.0), 5.0);
}

#[test]
fn projection_on_zero_length_segment() {
    let a = Coordinate::new(37.0, 127.0);
    let p = Coordinate::new(37.001, 127.001);
    assert_eq!(project_onto_segment(&p, &a, &a), a);
}
