use serde::{Deserialize, Serialize};

use crate::dubins;
use crate::{Waypoint, Waypoint3d};

/// Kinematic and sensing parameters of one fixed-wing vehicle.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Uav {
    pub id: String,
    /// Minimum turn radius (m).
    pub min_turn_radius: f64,
    /// Cruise air speed (m/s).
    pub max_air_speed: f64,
    /// Width of the camera ground footprint (m).
    pub view_width: f64,
    /// Depth of the camera ground footprint (m).
    pub view_depth: f64,
}

impl Uav {
    pub fn new(id: impl Into<String>, min_turn_radius: f64, max_air_speed: f64, view_width: f64, view_depth: f64) -> Self {
        assert!(min_turn_radius > 0.0 && max_air_speed > 0.0 && view_width > 0.0 && view_depth > 0.0);
        Uav { id: id.into(), min_turn_radius, max_air_speed, view_width, view_depth }
    }

    /// Length of the shortest feasible path between two oriented waypoints.
    pub fn travel_distance(&self, from: &Waypoint, to: &Waypoint) -> f64 {
        dubins::shortest_length(from, to, self.min_turn_radius)
    }

    pub fn travel_time(&self, from: &Waypoint, to: &Waypoint) -> f64 {
        self.travel_distance(from, to) / self.max_air_speed
    }

    /// Travel between 3d waypoints; climb is flown along the xy path.
    pub fn travel_distance_3d(&self, from: &Waypoint3d, to: &Waypoint3d) -> f64 {
        let xy = self.travel_distance(&from.as_2d(), &to.as_2d());
        let dz = to.z - from.z;
        (xy * xy + dz * dz).sqrt()
    }

    pub fn travel_time_3d(&self, from: &Waypoint3d, to: &Waypoint3d) -> f64 {
        self.travel_distance_3d(from, to) / self.max_air_speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_travel_time() {
        let uav = Uav::new("x8-01", 10.0, 15.0, 20.0, 20.0);
        let t = uav.travel_time(&Waypoint::new(0.0, 0.0, 0.0), &Waypoint::new(30.0, 0.0, 0.0));
        assert!((t - 2.0).abs() < 1e-6);
    }

    #[test]
    fn travel_3d_adds_climb() {
        let uav = Uav::new("x8-02", 10.0, 15.0, 20.0, 20.0);
        let flat = uav.travel_distance_3d(&Waypoint3d::new(0.0, 0.0, 0.0, 0.0), &Waypoint3d::new(30.0, 0.0, 0.0, 0.0));
        let climb = uav.travel_distance_3d(&Waypoint3d::new(0.0, 0.0, 0.0, 0.0), &Waypoint3d::new(30.0, 0.0, 40.0, 0.0));
        assert!((flat - 30.0).abs() < 1e-6);
        assert!((climb - 50.0).abs() < 1e-6);
    }
}
