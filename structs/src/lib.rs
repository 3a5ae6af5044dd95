use serde::{Deserialize, Serialize};

pub mod dubins;
pub mod error;
pub mod firedata;
pub mod plan;
pub mod raster;
pub mod report;
pub mod trajectory;
pub mod uav;

pub use error::{Error, Result};

/// Normalize an angle into (-pi, pi].
pub fn normalize_angle(a: f64) -> f64 {
    let r = a.rem_euclid(2.0 * std::f64::consts::PI);
    if r > std::f64::consts::PI {
        r - 2.0 * std::f64::consts::PI
    } else {
        r
    }
}

const ALMOST_EQUAL_EPS: f64 = 1e-6;

fn almost_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < ALMOST_EQUAL_EPS
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    pub fn dist(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn angle_to(&self, other: &Position) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Position3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Position3d { x, y, z }
    }

    pub fn dist(&self, other: &Position3d) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn hor_dist(&self, other: &Position3d) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn as_2d(&self) -> Position {
        Position { x: self.x, y: self.y }
    }
}

/// An oriented point in the projected frame. The heading is normalized into
/// (-pi, pi] on construction.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,
    pub dir: f64,
}

impl Waypoint {
    pub fn new(x: f64, y: f64, dir: f64) -> Self {
        Waypoint { x, y, dir: normalize_angle(dir) }
    }

    pub fn forward(&self, dist: f64) -> Waypoint {
        Waypoint { x: self.x + self.dir.cos() * dist, y: self.y + self.dir.sin() * dist, dir: self.dir }
    }

    pub fn rotate(&self, relative_angle: f64) -> Waypoint {
        Waypoint::new(self.x, self.y, self.dir + relative_angle)
    }

    pub fn with_dir(&self, absolute_angle: f64) -> Waypoint {
        Waypoint::new(self.x, self.y, absolute_angle)
    }

    pub fn as_point(&self) -> Position {
        Position { x: self.x, y: self.y }
    }

    pub fn almost_eq(&self, other: &Waypoint) -> bool {
        almost_equal(self.x, other.x) && almost_equal(self.y, other.y) && almost_equal(self.dir, other.dir)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Waypoint3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub dir: f64,
}

impl Waypoint3d {
    pub fn new(x: f64, y: f64, z: f64, dir: f64) -> Self {
        Waypoint3d { x, y, z, dir: normalize_angle(dir) }
    }

    pub fn forward(&self, dist: f64) -> Waypoint3d {
        Waypoint3d {
            x: self.x + self.dir.cos() * dist,
            y: self.y + self.dir.sin() * dist,
            z: self.z,
            dir: self.dir,
        }
    }

    pub fn up(&self, dist: f64) -> Waypoint3d {
        Waypoint3d { z: self.z + dist, ..*self }
    }

    pub fn rotate(&self, relative_angle: f64) -> Waypoint3d {
        Waypoint3d::new(self.x, self.y, self.z, self.dir + relative_angle)
    }

    pub fn with_dir(&self, absolute_angle: f64) -> Waypoint3d {
        Waypoint3d::new(self.x, self.y, self.z, absolute_angle)
    }

    pub fn as_point(&self) -> Position3d {
        Position3d { x: self.x, y: self.y, z: self.z }
    }

    pub fn as_2d(&self) -> Waypoint {
        Waypoint { x: self.x, y: self.y, dir: self.dir }
    }

    pub fn almost_eq(&self, other: &Waypoint3d) -> bool {
        almost_equal(self.x, other.x)
            && almost_equal(self.y, other.y)
            && almost_equal(self.z, other.z)
            && almost_equal(self.dir, other.dir)
    }
}

/// An oriented straight flight segment. Zero-length segments stand for a
/// single oriented observation point.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Segment3d {
    pub start: Waypoint3d,
    pub end: Waypoint3d,
    pub length: f64,
    pub xy_length: f64,
}

impl Segment3d {
    pub fn new(start: Waypoint3d, end: Waypoint3d) -> Self {
        let length = start.as_point().dist(&end.as_point());
        let xy_length = start.as_point().hor_dist(&end.as_point());
        Segment3d { start, end, length, xy_length }
    }

    pub fn from_waypoint(wp: Waypoint3d) -> Self {
        Segment3d { start: wp, end: wp, length: 0.0, xy_length: 0.0 }
    }

    pub fn from_length(start: Waypoint3d, xy_length: f64) -> Self {
        Segment3d { start, end: start.forward(xy_length), length: xy_length, xy_length }
    }

    pub fn reversed(&self) -> Segment3d {
        Segment3d::new(self.end.rotate(std::f64::consts::PI), self.start.rotate(std::f64::consts::PI))
    }

    /// Center of the ground footprint swept by the on-board camera.
    pub fn visibility_center(&self) -> Position {
        let half = self.xy_length / 2.0;
        Position {
            x: self.start.x + self.start.dir.cos() * half,
            y: self.start.y + self.start.dir.sin() * half,
        }
    }

    /// The same segment, translated in the xy plane.
    pub fn translated(&self, dx: f64, dy: f64) -> Segment3d {
        Segment3d {
            start: Waypoint3d { x: self.start.x + dx, y: self.start.y + dy, ..self.start },
            end: Waypoint3d { x: self.end.x + dx, y: self.end.y + dy, ..self.end },
            length: self.length,
            xy_length: self.xy_length,
        }
    }

    pub fn almost_eq(&self, other: &Segment3d) -> bool {
        self.start.almost_eq(&other.start) && self.end.almost_eq(&other.end) && almost_equal(self.length, other.length)
    }
}

/// Half-open time interval [start, end), in seconds.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        assert!(start <= end);
        TimeWindow { start, end }
    }

    pub fn center(&self) -> f64 {
        (self.start + self.end) / 2.0
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time < self.end
    }

    pub fn contains_window(&self, other: &TimeWindow) -> bool {
        self.start <= other.start && other.end < self.end
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct PositionTime {
    pub pt: Position,
    pub time: f64,
}

impl PositionTime {
    pub fn new(pt: Position, time: f64) -> Self {
        PositionTime { pt, time }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct PointTimeWindow {
    pub pt: Position,
    pub tw: TimeWindow,
}
