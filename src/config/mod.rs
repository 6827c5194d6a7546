//! Start-up configuration for the local planner.
//!
//! Loads vehicle constants, geometry and strategy parameters from a single YAML file.

mod planner_config;

pub use planner_config::PlannerConfig;
