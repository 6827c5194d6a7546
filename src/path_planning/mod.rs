// Local motion planning: vehicle model and trajectory search strategies

pub mod annealing_planner;
pub mod bicycle_model;
pub mod local_planner;
pub mod random_sample_planner;

pub use annealing_planner::{
    metropolis_probability, AnnealingParams, AnnealingPlanner, TemperatureSchedule,
};
pub use bicycle_model::{BicycleModel, BicycleModelConfig};
pub use local_planner::{PlannerKind, PlannerStrategy};
pub use random_sample_planner::{RandomSampleParams, RandomSamplePlanner, COLLISION_COST};
