#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fireobs_structs::firedata::FireData;
    use fireobs_structs::plan::Plan;
    use fireobs_structs::raster::Raster;
    use fireobs_structs::trajectory::TrajectoryConfig;
    use fireobs_structs::uav::Uav;
    use fireobs_structs::{TimeWindow, Waypoint3d};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    use crate::neighborhoods::default_neighborhoods;
    use crate::vns::{cost, plan_search, search, CancellationToken, SearchParams};

    /// A 100 m x 100 m field of 10 m cells, everything igniting at 100 s,
    /// one UAV taking off at ignition time with a two minute budget.
    fn coverage_plan() -> Plan {
        let uav = Uav::new("x8-01", 10.0, 15.0, 20.0, 20.0);
        let fire = Arc::new(FireData::from_ignitions(Raster::full(100.0, 10, 10, 0.0, 0.0, 10.0)));
        let conf = TrajectoryConfig::new(uav, 100.0, 120.0)
            .with_start_waypoint(Waypoint3d::new(0.0, 0.0, 30.0, 0.0));
        Plan::new("coverage", vec![conf], fire, TimeWindow::new(0.0, 300.0), vec![])
    }

    #[test]
    fn single_uav_coverage() {
        let _ = env_logger::try_init();
        let plan = coverage_plan();
        let initial_utility = plan.utility();
        let params = SearchParams { seed: 42, save_every: 100, max_steps: 5000, ..Default::default() };
        let result = search(plan, &default_neighborhoods(), &params, &CancellationToken::new());

        assert!(result.final_plan.is_valid());
        assert!(result.final_plan.utility() <= 0.5 * initial_utility);
        assert!(!result.intermediate.is_empty());

        let traj = result.final_plan.trajectories().get(0).unwrap();
        for i in 0..traj.size() {
            let t = traj.start_time(i);
            assert!(t >= traj.conf().start_time);
            assert!(t <= traj.conf().start_time + traj.conf().max_flight_time + 1e-6);
        }
    }

    #[test]
    fn search_is_deterministic_for_a_fixed_seed() {
        let _ = env_logger::try_init();
        let params = SearchParams { seed: 7, max_steps: 300, ..Default::default() };
        let a = search(coverage_plan(), &default_neighborhoods(), &params, &CancellationToken::new());
        let b = search(coverage_plan(), &default_neighborhoods(), &params, &CancellationToken::new());
        assert_eq!(a.final_plan, b.final_plan);
        assert_eq!(a.intermediate.len(), b.intermediate.len());
    }

    #[test]
    fn cancelled_search_returns_the_initial_plan() {
        let _ = env_logger::try_init();
        let token = CancellationToken::new();
        token.cancel();
        let plan = coverage_plan();
        let result = search(plan.clone(), &default_neighborhoods(), &SearchParams::default(), &token);
        assert_eq!(result.final_plan, plan);
        assert!(result.intermediate.is_empty());
    }

    #[test]
    fn plan_search_improves_the_default_scenario() {
        let _ = env_logger::try_init();
        let plan = coverage_plan();
        let initial_utility = plan.utility();
        let result = plan_search(plan, 42, 200, 1000);
        assert!(result.final_plan.utility() < initial_utility);
        assert_eq!(result.initial.utility(), initial_utility);

        let meta = result.final_plan.metadata();
        assert_eq!(meta["num_segments"], serde_json::json!(result.final_plan.num_segments()));
        assert_eq!(meta["trajectories"][0]["uav"], "x8-01");
    }

    /// Proposals either commit on a strict cost decrease or roll back to a
    /// bitwise-identical plan; the plan stays valid throughout.
    #[test]
    fn random_proposals_never_corrupt_the_plan() {
        let _ = env_logger::try_init();
        let neighborhoods = default_neighborhoods();
        let mut plan = coverage_plan();
        let alpha = 1e-4;
        let mut best_cost = cost(&plan, alpha);
        let mut rng = ChaChaRng::seed_from_u64(1);

        let mut proposals = 0;
        for _ in 0..10_000 {
            if proposals >= 1000 {
                break;
            }
            let neighborhood = &neighborhoods[rng.gen_range(0..neighborhoods.len())];
            let Some(update) = neighborhood.propose(&plan, &mut rng) else {
                continue;
            };
            proposals += 1;
            let before = plan.clone();
            match update.apply(&mut plan) {
                Err(_) => assert_eq!(plan, before),
                Ok(inverse) => {
                    let new_cost = cost(&plan, alpha);
                    if new_cost < best_cost {
                        best_cost = new_cost;
                    } else {
                        inverse.apply(&mut plan).unwrap();
                        assert_eq!(plan, before);
                    }
                }
            }
            assert!(plan.is_valid());
        }
        assert!(proposals >= 100, "only {proposals} proposals were generated");
    }
}
