//! rr_local_planner - reactive local motion planning for car-like robots
//!
//! Given the obstacle points around the vehicle, the planner searches over
//! short multi-segment steering/speed sequences, rolls each one out through a
//! kinematic bicycle model, scores it against a nearest-obstacle distance
//! cache and returns the best path. The first point of that path is the
//! command to actuate.

// Core modules
pub mod common;
pub mod config;

// Algorithm modules
pub mod control;
pub mod mapping;
pub mod path_planning;
pub mod mission_planning;

// Re-export common types for convenience
pub use common::{CenteredBox, ControlSegment, Obstacles, PathPoint, PlannedPath, Point2D, Pose};
pub use common::{LocalPlanner, MapCostInterface};
pub use common::{PlannerError, PlannerResult};
pub use config::PlannerConfig;
