//! Planner strategy chosen once at start-up

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::common::{LocalPlanner, MapCostInterface, PlannedPath, PlannerError, PlannerResult};
use crate::config::PlannerConfig;
use crate::path_planning::annealing_planner::AnnealingPlanner;
use crate::path_planning::bicycle_model::BicycleModel;
use crate::path_planning::random_sample_planner::RandomSamplePlanner;

/// Recognized planner type names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerKind {
    RandomSample,
    Annealing,
}

impl PlannerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlannerKind::RandomSample => "random_sample",
            PlannerKind::Annealing => "annealing",
        }
    }
}

impl FromStr for PlannerKind {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random_sample" => Ok(PlannerKind::RandomSample),
            "annealing" => Ok(PlannerKind::Annealing),
            other => Err(PlannerError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for PlannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The configured planner
pub enum PlannerStrategy {
    RandomSample(RandomSamplePlanner<StdRng>),
    Annealing(AnnealingPlanner<StdRng>),
}

impl PlannerStrategy {
    /// Build the planner named by the configuration
    pub fn from_config(config: &PlannerConfig) -> PlannerResult<Self> {
        let kind: PlannerKind = config.planner_type.parse()?;
        let model = BicycleModel::new(config.vehicle.clone())?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        match kind {
            PlannerKind::RandomSample => {
                let params = config.random_sample.clone().ok_or_else(|| {
                    PlannerError::MissingParameter("random_sample section".to_string())
                })?;
                Ok(PlannerStrategy::RandomSample(RandomSamplePlanner::new(
                    model, params, rng,
                )?))
            }
            PlannerKind::Annealing => {
                let params = config.annealing.clone().ok_or_else(|| {
                    PlannerError::MissingParameter("annealing section".to_string())
                })?;
                Ok(PlannerStrategy::Annealing(AnnealingPlanner::new(
                    model, params, rng,
                )?))
            }
        }
    }

    pub fn kind(&self) -> PlannerKind {
        match self {
            PlannerStrategy::RandomSample(_) => PlannerKind::RandomSample,
            PlannerStrategy::Annealing(_) => PlannerKind::Annealing,
        }
    }
}

impl LocalPlanner for PlannerStrategy {
    fn plan(&mut self, map: &dyn MapCostInterface) -> PlannedPath {
        match self {
            PlannerStrategy::RandomSample(planner) => planner.plan(map),
            PlannerStrategy::Annealing(planner) => planner.plan(map),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::mapping::ScriptedMapCost;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("annealing".parse::<PlannerKind>().unwrap(), PlannerKind::Annealing);
        assert_eq!(PlannerKind::RandomSample.to_string(), "random_sample");
        assert!(matches!(
            "rrt".parse::<PlannerKind>(),
            Err(PlannerError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_strategy_selected_from_config() {
        let mut config = PlannerConfig::example();
        config.planner_type = "annealing".to_string();
        let mut planner = PlannerStrategy::from_config(&config).unwrap();
        assert_eq!(planner.kind(), PlannerKind::Annealing);

        let plan = planner.plan(&ScriptedMapCost::clear());
        assert_eq!(plan.command().1, 0.0);
    }

    #[test]
    fn test_missing_section_is_an_error() {
        let mut config = PlannerConfig::example();
        config.random_sample = None;
        assert!(matches!(
            PlannerStrategy::from_config(&config),
            Err(PlannerError::MissingParameter(_))
        ));
    }
}
