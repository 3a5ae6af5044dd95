//! The VNS move set. Every neighborhood proposes a reversible update from a
//! shared seeded PRNG; infeasible candidates are recovered locally by
//! returning `None`.

use fireobs_structs::plan::{Plan, REDUNDANT_OBS_DIST};
use fireobs_structs::PointTimeWindow;
use rand_chacha::ChaChaRng;

use crate::updates::PlanUpdate;

pub mod dubins_align;
pub mod insertion;
pub mod replacement;

pub use dubins_align::{AlignOnNext, AlignOnPrev, AlignTwoConsecutive, OrientationChange, TwoOrientationChange};
pub use insertion::SegmentInsertion;
pub use replacement::SegmentReplacement;

pub trait Neighborhood {
    fn name(&self) -> &'static str;
    fn propose(&self, plan: &Plan, rng: &mut ChaChaRng) -> Option<PlanUpdate>;
}

/// The default move set: insertion first, then replacement, then the Dubins
/// alignment family.
pub fn default_neighborhoods() -> Vec<Box<dyn Neighborhood>> {
    vec![
        Box::new(SegmentInsertion::default()),
        Box::new(SegmentReplacement::default()),
        Box::new(AlignTwoConsecutive),
        Box::new(OrientationChange),
        Box::new(TwoOrientationChange),
        Box::new(AlignOnNext),
        Box::new(AlignOnPrev),
    ]
}

/// Possible observations not yet covered by an actual observation.
fn uncovered_observations(plan: &Plan) -> Vec<PointTimeWindow> {
    let done = plan.observations();
    plan.possible_observations()
        .iter()
        .filter(|possible| {
            done.iter().all(|obs| possible.pt.dist(&obs.pt) > REDUNDANT_OBS_DIST)
        })
        .copied()
        .collect()
}

/// Every (trajectory, segment) index pair that the search may rewrite.
fn modifiable_segments(plan: &Plan) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    for (t, traj) in plan.trajectories().iter().enumerate() {
        if let Some(last) = traj.last_modifiable() {
            out.extend((traj.first_modifiable()..=last).map(|i| (t, i)));
        }
    }
    out
}
