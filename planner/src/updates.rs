//! Typed, reversible plan edits. Applying an update yields its inverse, so
//! the search can speculate on a plan and roll back rejected moves.

use fireobs_structs::error::Result;
use fireobs_structs::plan::Plan;
use fireobs_structs::Segment3d;

#[derive(Clone, Debug, PartialEq)]
pub enum PlanUpdate {
    Insert { traj: usize, index: usize, segment: Segment3d },
    Erase { traj: usize, index: usize },
    Replace { traj: usize, index: usize, n_replaced: usize, segments: Vec<Segment3d> },
    /// Applied in order; the inverse is the reverse composition.
    Composite(Vec<PlanUpdate>),
}

impl PlanUpdate {
    pub fn replace_one(traj: usize, index: usize, segment: Segment3d) -> PlanUpdate {
        PlanUpdate::Replace { traj, index, n_replaced: 1, segments: vec![segment] }
    }

    /// Apply the update, returning the inverse that restores the previous
    /// plan state. On error the plan is left untouched.
    pub fn apply(&self, plan: &mut Plan) -> Result<PlanUpdate> {
        match self {
            PlanUpdate::Insert { traj, index, segment } => {
                plan.insert_segment(*traj, *index, *segment)?;
                Ok(PlanUpdate::Erase { traj: *traj, index: *index })
            }
            PlanUpdate::Erase { traj, index } => {
                let removed = plan.erase_segment(*traj, *index)?;
                Ok(PlanUpdate::Insert { traj: *traj, index: *index, segment: removed })
            }
            PlanUpdate::Replace { traj, index, n_replaced, segments } => {
                let removed = plan.replace_segment(*traj, *index, *n_replaced, segments)?;
                Ok(PlanUpdate::Replace {
                    traj: *traj,
                    index: *index,
                    n_replaced: segments.len(),
                    segments: removed,
                })
            }
            PlanUpdate::Composite(children) => {
                let mut inverses: Vec<PlanUpdate> = Vec::with_capacity(children.len());
                for child in children {
                    match child.apply(plan) {
                        Ok(inverse) => inverses.push(inverse),
                        Err(e) => {
                            for inverse in inverses.iter().rev() {
                                if let Err(rollback) = inverse.apply(plan) {
                                    panic!("rollback of composite update failed: {rollback}");
                                }
                            }
                            return Err(e);
                        }
                    }
                }
                inverses.reverse();
                Ok(PlanUpdate::Composite(inverses))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use fireobs_structs::error::Error;
    use fireobs_structs::firedata::FireData;
    use fireobs_structs::raster::Raster;
    use fireobs_structs::trajectory::TrajectoryConfig;
    use fireobs_structs::uav::Uav;
    use fireobs_structs::{TimeWindow, Waypoint3d};

    fn obs(x: f64, y: f64) -> Segment3d {
        Segment3d::from_waypoint(Waypoint3d::new(x, y, 30.0, 0.0))
    }

    /// One trajectory with a pinned start and two observation segments.
    fn plan() -> Plan {
        let uav = Uav::new("x8-01", 10.0, 10.0, 20.0, 20.0);
        let fire = Arc::new(FireData::from_ignitions(Raster::full(100.0, 10, 10, 0.0, 0.0, 10.0)));
        let conf = TrajectoryConfig::new(uav, 100.0, 10_000.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        let mut plan = Plan::new("fixture", vec![conf], fire, TimeWindow::new(0.0, 300.0), vec![]);
        plan.insert_segment(0, 1, obs(40.0, 0.0)).unwrap();
        plan.insert_segment(0, 2, obs(80.0, 0.0)).unwrap();
        plan
    }

    #[test]
    fn insert_inverse_restores_the_plan() {
        let original = plan();
        let mut mutated = original.clone();
        let update = PlanUpdate::Insert { traj: 0, index: 2, segment: obs(60.0, 10.0) };
        let inverse = update.apply(&mut mutated).unwrap();
        assert_eq!(mutated.num_segments(), original.num_segments() + 1);
        inverse.apply(&mut mutated).unwrap();
        assert_eq!(mutated, original);
        assert_eq!(mutated.utility(), original.utility());
        assert_eq!(mutated.duration(), original.duration());
    }

    #[test]
    fn erase_inverse_restores_the_segment() {
        let original = plan();
        let mut mutated = original.clone();
        let inverse = PlanUpdate::Erase { traj: 0, index: 1 }.apply(&mut mutated).unwrap();
        assert_eq!(mutated.num_segments(), original.num_segments() - 1);
        inverse.apply(&mut mutated).unwrap();
        assert_eq!(mutated, original);
    }

    #[test]
    fn replace_inverse_restores_the_block() {
        let original = plan();
        let mut mutated = original.clone();
        let update = PlanUpdate::Replace {
            traj: 0,
            index: 1,
            n_replaced: 2,
            segments: vec![obs(10.0, 90.0)],
        };
        let inverse = update.apply(&mut mutated).unwrap();
        assert_eq!(mutated.num_segments(), original.num_segments() - 1);
        inverse.apply(&mut mutated).unwrap();
        assert_eq!(mutated, original);
    }

    #[test]
    fn failed_update_leaves_the_plan_untouched() {
        let original = plan();
        let mut mutated = original.clone();
        let update = PlanUpdate::Insert { traj: 0, index: 99, segment: obs(60.0, 10.0) };
        assert!(matches!(update.apply(&mut mutated), Err(Error::IndexOutOfRange { .. })));
        assert_eq!(mutated, original);
    }

    #[test]
    fn composite_rolls_back_its_prefix_on_failure() {
        let original = plan();
        let mut mutated = original.clone();
        let update = PlanUpdate::Composite(vec![
            PlanUpdate::Insert { traj: 0, index: 1, segment: obs(20.0, 20.0) },
            PlanUpdate::Erase { traj: 0, index: 99 },
        ]);
        assert!(update.apply(&mut mutated).is_err());
        assert_eq!(mutated, original);
    }

    #[test]
    fn composite_inverse_is_the_reverse_composition() {
        let original = plan();
        let mut mutated = original.clone();
        let update = PlanUpdate::Composite(vec![
            PlanUpdate::Insert { traj: 0, index: 1, segment: obs(20.0, 20.0) },
            PlanUpdate::Erase { traj: 0, index: 3 },
        ]);
        let inverse = update.apply(&mut mutated).unwrap();
        inverse.apply(&mut mutated).unwrap();
        assert_eq!(mutated, original);
    }

    #[test]
    fn over_budget_insert_is_rejected_cleanly() {
        let uav = Uav::new("x8-02", 10.0, 10.0, 20.0, 20.0);
        let fire = Arc::new(FireData::from_ignitions(Raster::full(100.0, 10, 10, 0.0, 0.0, 10.0)));
        let conf = TrajectoryConfig::new(uav, 100.0, 5.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        let original = Plan::new("tight", vec![conf], fire, TimeWindow::new(0.0, 300.0), vec![]);
        let mut mutated = original.clone();
        let update = PlanUpdate::Insert { traj: 0, index: 1, segment: obs(90.0, 90.0) };
        assert_eq!(update.apply(&mut mutated), Err(Error::FlightTimeExceeded));
        assert_eq!(mutated, original);
    }
}
