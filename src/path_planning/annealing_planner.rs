//! Simulated annealing local planner
//!
//! Perturbs a per-segment (steer, speed) state and accepts worse states with
//! Metropolis probability under a cooling temperature. The search starts from
//! the cheaper of driving straight ahead and standing still, and the best state
//! ever seen is returned, so the result is never worse than either.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::common::{
    LocalPlanner, MapCostInterface, PathPoint, PlannedPath, PlannerError, PlannerResult, Point2D,
};
use crate::path_planning::bicycle_model::BicycleModel;

/// Clearance used in place of non-positive values when costing collisions [m]
const CLEARANCE_FLOOR: f64 = 1e-3;
/// Standard deviation of steering proposals as a fraction of max_steering
const STEER_STEP_FRACTION: f64 = 0.5;
/// Standard deviation of speed proposals as a fraction of max_speed
const SPEED_STEP_FRACTION: f64 = 0.25;
/// Chance that a proposal shifts every segment's speed together
const GLOBAL_SPEED_MOVE_PROBABILITY: f64 = 0.25;

/// How temperature moves from start to end over the annealing steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureSchedule {
    #[default]
    Linear,
    Geometric,
}

impl TemperatureSchedule {
    /// Temperature at `progress` in [0, 1]
    pub fn temperature(&self, start: f64, end: f64, progress: f64) -> f64 {
        match self {
            TemperatureSchedule::Linear => start + (end - start) * progress,
            TemperatureSchedule::Geometric => start * (end / start).powf(progress),
        }
    }
}

/// Configuration for the annealing planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealingParams {
    pub n_path_segments: usize,
    pub annealing_steps: usize,
    pub k_dist: f64,
    pub k_speed: f64,
    pub k_final_pose: f64,
    /// Added when the path ends behind the start
    pub backwards_penalty: f64,
    /// Added when any point of the path collides
    pub collision_penalty: f64,
    /// Steering magnitude limit [rad]
    pub max_steering: f64,
    pub acceptance_scale: f64,
    pub temperature_start: f64,
    pub temperature_end: f64,
    #[serde(default)]
    pub schedule: TemperatureSchedule,
    /// Target end position; straight ahead by the nominal path length when absent
    #[serde(default)]
    pub goal: Option<[f64; 2]>,
}

impl AnnealingParams {
    pub fn validate(&self) -> PlannerResult<()> {
        if self.n_path_segments == 0 || self.annealing_steps == 0 {
            return Err(PlannerError::InvalidParameter(
                "n_path_segments and annealing_steps must be at least 1".to_string(),
            ));
        }
        let weights = [
            ("k_dist", self.k_dist),
            ("k_speed", self.k_speed),
            ("k_final_pose", self.k_final_pose),
            ("backwards_penalty", self.backwards_penalty),
            ("collision_penalty", self.collision_penalty),
        ];
        for (name, value) in weights {
            if !value.is_finite() {
                return Err(PlannerError::InvalidParameter(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        if !(self.max_steering.is_finite() && self.max_steering >= 0.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "max_steering must be non-negative, got {}",
                self.max_steering
            )));
        }
        if !(self.acceptance_scale.is_finite() && self.acceptance_scale > 0.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "acceptance_scale must be positive, got {}",
                self.acceptance_scale
            )));
        }
        let temperatures = [self.temperature_start, self.temperature_end];
        if temperatures.iter().any(|t| !(t.is_finite() && *t >= 0.0)) {
            return Err(PlannerError::InvalidParameter(
                "temperatures must be finite and non-negative".to_string(),
            ));
        }
        if self.schedule == TemperatureSchedule::Geometric
            && temperatures.iter().any(|t| *t <= 0.0)
        {
            return Err(PlannerError::InvalidParameter(
                "geometric schedule needs positive temperatures".to_string(),
            ));
        }
        Ok(())
    }
}

/// Simulated annealing planner
pub struct AnnealingPlanner<R: Rng = StdRng> {
    model: BicycleModel,
    params: AnnealingParams,
    rng: R,
    goal: Point2D,
}

impl AnnealingPlanner<StdRng> {
    pub fn with_seed(
        model: BicycleModel,
        params: AnnealingParams,
        seed: u64,
    ) -> PlannerResult<Self> {
        Self::new(model, params, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> AnnealingPlanner<R> {
    pub fn new(model: BicycleModel, params: AnnealingParams, rng: R) -> PlannerResult<Self> {
        params.validate()?;
        if params.n_path_segments != model.segment_count() {
            return Err(PlannerError::InvalidParameter(format!(
                "n_path_segments ({}) must match the vehicle's segment_sections ({})",
                params.n_path_segments,
                model.segment_count()
            )));
        }
        let goal = match params.goal {
            Some([x, y]) => Point2D::new(x, y),
            None => Point2D::new(model.total_length(), 0.0),
        };
        Ok(Self {
            model,
            params,
            rng,
            goal,
        })
    }

    pub fn params(&self) -> &AnnealingParams {
        &self.params
    }

    pub fn goal(&self) -> Point2D {
        self.goal
    }

    /// Straight ahead at full speed
    pub fn initial_state(&self) -> Vec<(f64, f64)> {
        vec![(0.0, self.model.max_speed()); self.params.n_path_segments]
    }

    /// Zero speed on every segment
    pub fn stop_state(&self) -> Vec<(f64, f64)> {
        vec![(0.0, 0.0); self.params.n_path_segments]
    }

    /// Expand a state and return its path and cost
    pub fn evaluate(
        &self,
        state: &[(f64, f64)],
        map: &dyn MapCostInterface,
    ) -> (Vec<PathPoint>, f64) {
        let segments = self.model.segments_from_controls(state);
        let path = self.model.roll_out(&segments);
        let clearances = map.path_distance_costs(&path);
        let cost = self.cost(&path, &clearances);
        (path, cost)
    }

    fn cost(&self, path: &[PathPoint], clearances: &[f64]) -> f64 {
        let n = path.len().max(1) as f64;
        let collided = clearances.iter().any(|&c| c <= 0.0);
        let distance_term = clearances
            .iter()
            .map(|&c| {
                if c > 0.0 {
                    // INFINITY maps to zero
                    1.0 / c
                } else {
                    1.0 / CLEARANCE_FLOOR - c
                }
            })
            .sum::<f64>()
            / n;
        let speed_term = -path.iter().map(|p| p.speed).sum::<f64>() / n;

        let final_pose = path[path.len() - 1].pose;
        let final_pose_term = final_pose.position().distance(&self.goal);
        let backwards = if final_pose.x < 0.0 { 1.0 } else { 0.0 };
        let collision = if collided { 1.0 } else { 0.0 };

        self.params.k_dist * distance_term
            + self.params.k_speed * speed_term
            + self.params.k_final_pose * final_pose_term
            + self.params.backwards_penalty * backwards
            + self.params.collision_penalty * collision
    }

    /// Change one segment's steer and speed, or now and then shift the speed of
    /// every segment by the same amount
    fn perturb(&mut self, state: &[(f64, f64)]) -> Vec<(f64, f64)> {
        let mut proposal = state.to_vec();
        let max_steering = self.params.max_steering;
        let max_speed = self.model.max_speed();

        if self.rng.gen::<f64>() < GLOBAL_SPEED_MOVE_PROBABILITY {
            let shift = Self::noise(&mut self.rng, max_speed * SPEED_STEP_FRACTION);
            for (_, speed) in proposal.iter_mut() {
                *speed = (*speed + shift).clamp(0.0, max_speed);
            }
            return proposal;
        }

        let index = self.rng.gen_range(0..proposal.len());
        let (steer, speed) = proposal[index];
        let steer = steer + Self::noise(&mut self.rng, max_steering * STEER_STEP_FRACTION);
        let speed = speed + Self::noise(&mut self.rng, max_speed * SPEED_STEP_FRACTION);
        proposal[index] = (
            steer.clamp(-max_steering, max_steering),
            speed.clamp(0.0, max_speed),
        );
        proposal
    }

    fn noise(rng: &mut R, stddev: f64) -> f64 {
        match Normal::new(0.0, stddev) {
            Ok(normal) => normal.sample(rng),
            Err(_) => 0.0,
        }
    }

    fn temperature(&self, step: usize) -> f64 {
        let progress = if self.params.annealing_steps > 1 {
            step as f64 / (self.params.annealing_steps - 1) as f64
        } else {
            1.0
        };
        self.params.schedule.temperature(
            self.params.temperature_start,
            self.params.temperature_end,
            progress,
        )
    }
}

/// Probability of accepting a cost increase of `delta` at `temperature`
pub fn metropolis_probability(delta: f64, temperature: f64, acceptance_scale: f64) -> f64 {
    if delta <= 0.0 {
        return 1.0;
    }
    let scale = temperature * acceptance_scale;
    if scale <= 0.0 {
        return 0.0;
    }
    (-delta / scale).exp()
}

impl<R: Rng> LocalPlanner for AnnealingPlanner<R> {
    fn plan(&mut self, map: &dyn MapCostInterface) -> PlannedPath {
        let straight = self.initial_state();
        let stop = self.stop_state();
        let (straight_path, straight_cost) = self.evaluate(&straight, map);
        let (stop_path, stop_cost) = self.evaluate(&stop, map);
        let (mut state, mut cost, mut best_path) = if stop_cost < straight_cost {
            (stop, stop_cost, stop_path)
        } else {
            (straight, straight_cost, straight_path)
        };
        let mut best_cost = cost;
        let mut accepted = 0;

        for step in 0..self.params.annealing_steps {
            let temperature = self.temperature(step);
            let proposal = self.perturb(&state);
            let (path, proposal_cost) = self.evaluate(&proposal, map);

            let accept = proposal_cost < cost || {
                let p = metropolis_probability(
                    proposal_cost - cost,
                    temperature,
                    self.params.acceptance_scale,
                );
                self.rng.gen::<f64>() < p
            };
            if !accept {
                continue;
            }

            accepted += 1;
            state = proposal;
            cost = proposal_cost;
            if cost < best_cost {
                best_cost = cost;
                best_path = path;
            }
        }

        debug!(
            "annealing planner: accepted {}/{} proposals, best cost {}",
            accepted, self.params.annealing_steps, best_cost
        );
        PlannedPath::new(best_path, best_cost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::ScriptedMapCost;
    use crate::path_planning::bicycle_model::BicycleModelConfig;

    fn create_params() -> AnnealingParams {
        AnnealingParams {
            n_path_segments: 3,
            annealing_steps: 300,
            k_dist: 1.0,
            k_speed: 1.0,
            k_final_pose: 0.5,
            backwards_penalty: 100.0,
            collision_penalty: 1000.0,
            max_steering: 0.4,
            acceptance_scale: 1.0,
            temperature_start: 1.0,
            temperature_end: 0.01,
            schedule: TemperatureSchedule::Linear,
            goal: None,
        }
    }

    fn create_planner(seed: u64) -> AnnealingPlanner {
        let model = BicycleModel::new(BicycleModelConfig::default()).unwrap();
        AnnealingPlanner::with_seed(model, create_params(), seed).unwrap()
    }

    #[test]
    fn test_clear_map_keeps_straight_plan() {
        let mut planner = create_planner(1);
        let plan = planner.plan(&ScriptedMapCost::clear());
        let max_speed = BicycleModelConfig::default().max_speed;

        assert_eq!(plan.command(), (max_speed, 0.0));
        assert!(plan.final_pose().y.abs() < 1e-12);
        assert!((plan.cost() + max_speed).abs() < 1e-9);
    }

    #[test]
    fn test_never_worse_than_straight_ahead() {
        let maps = [
            ScriptedMapCost::block_at(1.2, 0.0, 0.3),
            ScriptedMapCost::wall_ahead(1.0),
            ScriptedMapCost::block_at(0.8, -0.5, 0.4),
            ScriptedMapCost::from_fn(|pose| 0.2 + pose.y.abs()),
        ];
        for (seed, map) in maps.iter().enumerate() {
            let mut planner = create_planner(seed as u64);
            let (_, initial_cost) = planner.evaluate(&planner.initial_state(), map);
            let plan = planner.plan(map);
            assert!(plan.cost() <= initial_cost);
        }
    }

    #[test]
    fn test_steers_around_block() {
        let mut planner = create_planner(5);
        let map = ScriptedMapCost::block_at(1.2, 0.0, 0.3);
        let plan = planner.plan(&map);

        let costs = map.path_distance_costs(plan.path());
        assert!(costs.iter().all(|&c| c > 0.0));
        assert!(plan.cost() < 1000.0);
    }

    #[test]
    fn test_all_collisions_return_least_bad_plan() {
        let mut planner = create_planner(9);
        let map = ScriptedMapCost::blocked();
        let (_, initial_cost) = planner.evaluate(&planner.initial_state(), &map);
        let plan = planner.plan(&map);

        assert!(plan.cost() >= 1000.0);
        assert!(plan.cost() <= initial_cost);
        assert!(!plan.path().is_empty());
    }

    #[test]
    fn test_stops_for_unavoidable_wall() {
        let mut planner = create_planner(4);
        let map = ScriptedMapCost::wall_ahead(0.3);
        let (_, stop_cost) = planner.evaluate(&planner.stop_state(), &map);
        let plan = planner.plan(&map);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.command().0, 0.0);
        assert!(plan.cost() <= stop_cost);
        assert!(map.path_distance_costs(plan.path()).iter().all(|&c| c > 0.0));
    }

    #[test]
    fn test_perturbation_respects_limits() {
        let mut planner = create_planner(8);
        let max_speed = BicycleModelConfig::default().max_speed;
        let mut state = planner.initial_state();
        for _ in 0..500 {
            state = planner.perturb(&state);
            for &(steer, speed) in &state {
                assert!(steer.abs() <= planner.params().max_steering);
                assert!((0.0..=max_speed).contains(&speed));
            }
        }
    }

    #[test]
    fn test_same_seed_same_plan() {
        let map = ScriptedMapCost::block_at(1.0, 0.2, 0.3);
        assert_eq!(create_planner(21).plan(&map), create_planner(21).plan(&map));
    }

    #[test]
    fn test_metropolis_probability() {
        assert_eq!(metropolis_probability(-1.0, 1.0, 1.0), 1.0);
        assert!((metropolis_probability(1.0, 1.0, 2.0) - (-0.5f64).exp()).abs() < 1e-12);
        assert_eq!(metropolis_probability(1.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn test_temperature_schedules() {
        let linear = TemperatureSchedule::Linear;
        assert!((linear.temperature(1.0, 0.0, 0.25) - 0.75).abs() < 1e-12);
        let geometric = TemperatureSchedule::Geometric;
        assert!((geometric.temperature(1.0, 0.01, 0.5) - 0.1).abs() < 1e-12);
        assert!((geometric.temperature(1.0, 0.01, 1.0) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let model = BicycleModel::new(BicycleModelConfig::default()).unwrap();
        let params = AnnealingParams {
            schedule: TemperatureSchedule::Geometric,
            temperature_end: 0.0,
            ..create_params()
        };
        assert!(AnnealingPlanner::with_seed(model.clone(), params, 0).is_err());

        let params = AnnealingParams {
            acceptance_scale: 0.0,
            ..create_params()
        };
        assert!(AnnealingPlanner::with_seed(model, params, 0).is_err());
    }
}
