//! Planning cycle orchestration
//!
//! Hands obstacle sets from a perception thread to the planner and runs one
//! planning pass per cycle.

pub mod planning_loop;

pub use planning_loop::{ObstacleSlot, PlanningLoop};
