//! Random sample local planner
//!
//! Draws steering sequences from a chain of normal distributions and a speed for
//! each candidate, expands them through the bicycle model and keeps the cheapest
//! path with respect to the map. Straight ahead at full speed and standing still
//! are always among the candidates, and any collision-free path beats every
//! colliding one.

use std::cmp::Reverse;
use std::collections::VecDeque;

use log::debug;
use ordered_float::OrderedFloat;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::common::{
    LocalPlanner, MapCostInterface, PathPoint, PlannedPath, PlannerError, PlannerResult, Point2D,
};
use crate::path_planning::bicycle_model::BicycleModel;

/// Distance term used for any path with a point in collision
pub const COLLISION_COST: f64 = 1e6;

/// Configuration for the random sample planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomSampleParams {
    /// Number of control segments per candidate
    pub n_path_segments: usize,
    /// Steering limit for each segment [rad]
    pub steer_limits: Vec<f64>,
    /// Steering standard deviation for each segment [rad]
    pub steer_stddevs: Vec<f64>,
    /// Candidates ending this close to an evaluated endpoint are skipped [m]
    pub path_similarity_cutoff: f64,
    /// Candidates costing more than this multiple of the best are discarded and
    /// do not block similar later samples
    pub max_relative_cost: f64,
    /// Weight of the clearance term
    pub k_dist: f64,
    /// Weight of the speed term
    pub k_speed: f64,
    /// Sample budget per plan
    pub n_control_samples: usize,
    /// Number of past commands averaged into the output (0 or 1 disables)
    pub smoothing_array_size: usize,
    /// Clearance below which speed is derated [m]
    pub obs_dist_slow_thresh: f64,
    /// Speed multiplier applied near obstacles
    pub obs_dist_slow_ratio: f64,
}

impl RandomSampleParams {
    pub fn validate(&self) -> PlannerResult<()> {
        let n = self.n_path_segments;
        if n == 0 {
            return Err(PlannerError::InvalidParameter(
                "n_path_segments must be at least 1".to_string(),
            ));
        }
        if self.steer_limits.len() != n || self.steer_stddevs.len() != n {
            return Err(PlannerError::InvalidParameter(format!(
                "steer_limits ({}) and steer_stddevs ({}) must both have n_path_segments ({}) entries",
                self.steer_limits.len(),
                self.steer_stddevs.len(),
                n
            )));
        }
        let non_negative = self
            .steer_limits
            .iter()
            .chain(self.steer_stddevs.iter())
            .chain([&self.path_similarity_cutoff, &self.obs_dist_slow_thresh]);
        if non_negative.copied().any(|v| !(v.is_finite() && v >= 0.0)) {
            return Err(PlannerError::InvalidParameter(
                "steer limits, standard deviations, path_similarity_cutoff and obs_dist_slow_thresh must be finite and non-negative".to_string(),
            ));
        }
        if self.n_control_samples == 0 {
            return Err(PlannerError::InvalidParameter(
                "n_control_samples must be at least 1".to_string(),
            ));
        }
        if !(self.max_relative_cost >= 1.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "max_relative_cost must be >= 1, got {}",
                self.max_relative_cost
            )));
        }
        if !(0.0..=1.0).contains(&self.obs_dist_slow_ratio) {
            return Err(PlannerError::InvalidParameter(format!(
                "obs_dist_slow_ratio must be within [0, 1], got {}",
                self.obs_dist_slow_ratio
            )));
        }
        if !(self.k_dist.is_finite() && self.k_speed.is_finite()) {
            return Err(PlannerError::InvalidParameter(
                "k_dist and k_speed must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

type Rank = (bool, OrderedFloat<f64>, Reverse<OrderedFloat<f64>>, OrderedFloat<f64>);

#[derive(Debug, Clone)]
struct Candidate {
    path: Vec<PathPoint>,
    cost: f64,
    collided: bool,
}

impl Candidate {
    /// Lower is better: collision-free first, then cost, then higher commanded
    /// speed, then smaller steering
    fn rank(&self) -> Rank {
        let first = &self.path[0];
        (
            self.collided,
            OrderedFloat(self.cost),
            Reverse(OrderedFloat(first.speed)),
            OrderedFloat(first.steer.abs()),
        )
    }
}

/// Random sample planner
pub struct RandomSamplePlanner<R: Rng = StdRng> {
    model: BicycleModel,
    params: RandomSampleParams,
    rng: R,
    command_history: VecDeque<(f64, f64)>,
}

impl RandomSamplePlanner<StdRng> {
    /// Planner with a reproducible sample stream
    pub fn with_seed(
        model: BicycleModel,
        params: RandomSampleParams,
        seed: u64,
    ) -> PlannerResult<Self> {
        Self::new(model, params, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> RandomSamplePlanner<R> {
    pub fn new(model: BicycleModel, params: RandomSampleParams, rng: R) -> PlannerResult<Self> {
        params.validate()?;
        if params.n_path_segments != model.segment_count() {
            return Err(PlannerError::InvalidParameter(format!(
                "n_path_segments ({}) must match the vehicle's segment_sections ({})",
                params.n_path_segments,
                model.segment_count()
            )));
        }
        Ok(Self {
            command_history: VecDeque::with_capacity(params.smoothing_array_size),
            model,
            params,
            rng,
        })
    }

    pub fn params(&self) -> &RandomSampleParams {
        &self.params
    }

    /// Straight-ahead controls at full speed
    fn straight_controls(&self) -> Vec<(f64, f64)> {
        vec![(0.0, self.model.max_speed()); self.params.n_path_segments]
    }

    /// Zero speed everywhere: the path is the current pose
    fn stop_controls(&self) -> Vec<(f64, f64)> {
        vec![(0.0, 0.0); self.params.n_path_segments]
    }

    /// Each segment's steer is drawn around the previous segment's steer. One
    /// speed in `[0, max_speed]` is drawn for the whole candidate.
    fn sample_controls(&mut self) -> Vec<(f64, f64)> {
        let mut controls = Vec::with_capacity(self.params.n_path_segments);
        let speed = self.rng.gen_range(0.0..=self.model.max_speed());
        let mut previous = 0.0;
        for (&limit, &stddev) in self
            .params
            .steer_limits
            .iter()
            .zip(self.params.steer_stddevs.iter())
        {
            let steer = match Normal::new(previous, stddev) {
                Ok(normal) => normal.sample(&mut self.rng),
                Err(_) => previous,
            };
            let steer = steer.clamp(-limit, limit);
            controls.push((steer, speed));
            previous = steer;
        }
        controls
    }

    /// Score a path and derate its speeds near obstacles. Also reports whether
    /// any point collides.
    fn score(&self, path: &mut [PathPoint], clearances: &[f64]) -> (f64, bool) {
        let mut collided = false;
        let mut inverse_clearance = 0.0;
        let mut speed_sum = 0.0;

        for (point, &clearance) in path.iter_mut().zip(clearances) {
            if clearance <= 0.0 {
                collided = true;
            } else if clearance.is_finite() {
                inverse_clearance += 1.0 / clearance;
            }
            if clearance < self.params.obs_dist_slow_thresh {
                point.speed *= self.params.obs_dist_slow_ratio;
            }
            speed_sum += point.speed;
        }

        let n = path.len().max(1) as f64;
        let distance_term = if collided {
            COLLISION_COST
        } else {
            inverse_clearance / n
        };
        let cost = self.params.k_dist * distance_term - self.params.k_speed * speed_sum / n;
        (cost, collided)
    }

    fn evaluate(&self, controls: &[(f64, f64)], map: &dyn MapCostInterface) -> Candidate {
        let segments = self.model.segments_from_controls(controls);
        let mut path = self.model.roll_out(&segments);
        let clearances = map.path_distance_costs(&path);
        let (cost, collided) = self.score(&mut path, &clearances);
        Candidate {
            path,
            cost,
            collided,
        }
    }

    /// Whether `candidate` is worse than `best` by more than the allowed cost
    /// ratio. A collision-free candidate is never discarded against a colliding best.
    fn exceeds_relative_cost(&self, candidate: &Candidate, best: &Candidate) -> bool {
        if candidate.collided != best.collided {
            return candidate.collided;
        }
        candidate.cost > best.cost + (self.params.max_relative_cost - 1.0) * best.cost.abs()
    }

    /// Average the chosen command with the recent ones
    fn smooth_command(&mut self, path: &mut [PathPoint]) {
        let window = self.params.smoothing_array_size;
        if window <= 1 {
            return;
        }
        let first = &mut path[0];
        self.command_history.push_back((first.speed, first.steer));
        while self.command_history.len() > window {
            self.command_history.pop_front();
        }
        let n = self.command_history.len() as f64;
        let (speed, steer) = self
            .command_history
            .iter()
            .fold((0.0, 0.0), |(v, s), &(cv, cs)| (v + cv, s + cs));
        first.speed = speed / n;
        first.steer = steer / n;
    }
}

impl<R: Rng> LocalPlanner for RandomSamplePlanner<R> {
    fn plan(&mut self, map: &dyn MapCostInterface) -> PlannedPath {
        let mut best: Option<Candidate> = None;
        let mut endpoints: Vec<Point2D> = Vec::with_capacity(self.params.n_control_samples);
        let mut pruned = 0;
        let mut discarded = 0;

        for sample in 0..self.params.n_control_samples {
            let controls = match sample {
                0 => self.straight_controls(),
                1 => self.stop_controls(),
                _ => self.sample_controls(),
            };
            let segments = self.model.segments_from_controls(&controls);
            let mut path = self.model.roll_out(&segments);

            let end = path[path.len() - 1].pose.position();
            if endpoints
                .iter()
                .any(|e| e.distance(&end) < self.params.path_similarity_cutoff)
            {
                pruned += 1;
                continue;
            }

            let clearances = map.path_distance_costs(&path);
            let (cost, collided) = self.score(&mut path, &clearances);
            let candidate = Candidate {
                path,
                cost,
                collided,
            };

            let keep = match &best {
                None => true,
                Some(current) if self.exceeds_relative_cost(&candidate, current) => {
                    discarded += 1;
                    continue;
                }
                Some(current) => candidate.rank() < current.rank(),
            };
            endpoints.push(end);
            if keep {
                best = Some(candidate);
            }
        }

        debug!(
            "random sample planner: {} samples, {} pruned as similar, {} discarded as too costly",
            self.params.n_control_samples, pruned, discarded
        );

        let Candidate { mut path, cost, .. } = match best {
            Some(candidate) => candidate,
            None => self.evaluate(&self.straight_controls(), map),
        };
        self.smooth_command(&mut path);
        PlannedPath::new(path, cost)
    }
}
