//! Common types, traits, and error definitions for rr_local_planner
//!
//! This module provides the value types and seams shared by the
//! vehicle model, the obstacle cache and the planners.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
