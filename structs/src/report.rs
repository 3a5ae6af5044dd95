//! Value types exchanged with the plan-execution adapter. The core hands
//! over a [`PlanView`] and receives execution/state reports back; it never
//! touches the vehicle wire protocol itself.

use serde::{Deserialize, Serialize};

use crate::Waypoint3d;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanExecutionState {
    None,
    Ready,
    /// Plan is still running.
    Executing,
    /// Plan execution failed.
    Failure,
    /// Plan successfully executed.
    Success,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlanExecutionReport {
    pub timestamp: f64,
    pub plan_id: String,
    pub state: PlanExecutionState,
    pub vehicles: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct UavStateReport {
    pub timestamp: f64,
    pub uav_id: u16,
    /// WGS84 latitude (rad).
    pub lat: f64,
    /// WGS84 longitude (rad).
    pub lon: f64,
    /// Altitude asl (m).
    pub height: f32,
    /// Roll (rad).
    pub phi: f32,
    /// Pitch (rad).
    pub theta: f32,
    /// Yaw (rad).
    pub psi: f32,
    /// North ground speed (m/s).
    pub vx: f32,
    /// East ground speed (m/s).
    pub vy: f32,
    /// Down ground speed (m/s).
    pub vz: f32,
}

/// One waypoint of an executable trajectory, with its overflight time.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WaypointTime {
    pub waypoint: Waypoint3d,
    pub time: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrajectoryView {
    pub uav_id: String,
    pub waypoints: Vec<WaypointTime>,
}

/// A whole plan in the form consumed by the execution adapter.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PlanView {
    pub name: String,
    pub trajectories: Vec<TrajectoryView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_round_trip_through_json() {
        let report = PlanExecutionReport {
            timestamp: 1234.5,
            plan_id: "plan-1".to_string(),
            state: PlanExecutionState::Executing,
            vehicles: vec!["x8-01".to_string()],
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: PlanExecutionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}
