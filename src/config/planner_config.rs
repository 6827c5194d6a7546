//! Planner configuration and validation.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::common::{CenteredBox, PlannerError, PlannerResult};
use crate::mapping::DEFAULT_CACHE_RESOLUTION;
use crate::path_planning::{
    AnnealingParams, BicycleModelConfig, PlannerKind, RandomSampleParams, TemperatureSchedule,
};

fn default_map_size() -> CenteredBox {
    CenteredBox::new(7.0, 5.0, 6.0, 6.0)
}

fn default_cache_resolution() -> f64 {
    DEFAULT_CACHE_RESOLUTION
}

/// Full planner configuration loaded from YAML
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// "random_sample" or "annealing"
    pub planner_type: String,

    /// Seed for the sampling stream; fresh entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,

    /// Vehicle constants
    pub vehicle: BicycleModelConfig,

    /// Vehicle footprint around its reference point
    pub hitbox: CenteredBox,

    /// Extent of the obstacle cache
    #[serde(default = "default_map_size")]
    pub map_size: CenteredBox,

    /// Obstacle cache cell size [m]
    #[serde(default = "default_cache_resolution")]
    pub cache_resolution: f64,

    /// Random sample planner parameters
    #[serde(default)]
    pub random_sample: Option<RandomSampleParams>,

    /// Annealing planner parameters
    #[serde(default)]
    pub annealing: Option<AnnealingParams>,
}

impl PlannerConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> PlannerResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&contents)?;
        info!(
            "loaded {} planner configuration from {}",
            config.planner_type,
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate from a YAML string
    pub fn from_yaml(yaml: &str) -> PlannerResult<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed strategy name
    pub fn planner_kind(&self) -> PlannerResult<PlannerKind> {
        self.planner_type.parse()
    }

    /// Check everything the planner relies on before it runs
    pub fn validate(&self) -> PlannerResult<()> {
        self.vehicle.validate()?;
        if !self.hitbox.is_valid() {
            return Err(PlannerError::InvalidParameter(format!(
                "hitbox {:?} must have non-negative sides and non-zero area",
                self.hitbox
            )));
        }
        if !self.map_size.is_valid() {
            return Err(PlannerError::InvalidParameter(format!(
                "map_size {:?} must have non-negative sides and non-zero area",
                self.map_size
            )));
        }
        if !(self.cache_resolution.is_finite() && self.cache_resolution > 0.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "cache_resolution must be positive, got {}",
                self.cache_resolution
            )));
        }

        // Paths may turn any way, so they must fit in the smallest extent
        let path_length: f64 = self.vehicle.segment_sections.iter().sum::<usize>() as f64
            * self.vehicle.distance_increment;
        let extent = self
            .map_size
            .front
            .min(self.map_size.left)
            .min(self.map_size.right)
            .min(self.map_size.back);
        if path_length > extent {
            return Err(PlannerError::InvalidParameter(format!(
                "nominal path length {:.2} m leaves the {:.2} m cached map",
                path_length, extent
            )));
        }

        let segments = self.vehicle.segment_sections.len();
        match self.planner_kind()? {
            PlannerKind::RandomSample => {
                let params = self.random_sample.as_ref().ok_or_else(|| {
                    PlannerError::MissingParameter("random_sample section".to_string())
                })?;
                params.validate()?;
                Self::check_segments(params.n_path_segments, segments)
            }
            PlannerKind::Annealing => {
                let params = self.annealing.as_ref().ok_or_else(|| {
                    PlannerError::MissingParameter("annealing section".to_string())
                })?;
                params.validate()?;
                Self::check_segments(params.n_path_segments, segments)
            }
        }
    }

    fn check_segments(n_path_segments: usize, sections: usize) -> PlannerResult<()> {
        if n_path_segments != sections {
            return Err(PlannerError::InvalidParameter(format!(
                "n_path_segments ({}) must match segment_sections ({})",
                n_path_segments, sections
            )));
        }
        Ok(())
    }

    /// A complete configuration with both strategies filled in
    pub fn example() -> Self {
        Self {
            planner_type: PlannerKind::RandomSample.as_str().to_string(),
            seed: Some(0),
            vehicle: BicycleModelConfig::default(),
            hitbox: CenteredBox::new(0.45, 0.1, 0.15, 0.15),
            map_size: default_map_size(),
            cache_resolution: DEFAULT_CACHE_RESOLUTION,
            random_sample: Some(RandomSampleParams {
                n_path_segments: 3,
                steer_limits: vec![0.4, 0.4, 0.4],
                steer_stddevs: vec![0.2, 0.1, 0.1],
                path_similarity_cutoff: 0.05,
                max_relative_cost: 4.0,
                k_dist: 1.0,
                k_speed: 1.0,
                n_control_samples: 300,
                smoothing_array_size: 3,
                obs_dist_slow_thresh: 0.4,
                obs_dist_slow_ratio: 0.6,
            }),
            annealing: Some(AnnealingParams {
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
            }),
        }
    }
}
