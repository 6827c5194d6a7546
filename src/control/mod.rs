//! Control utilities
//!
//! Rate and range limited tracking used for steering actuation.

pub mod linear_tracking_filter;

pub use linear_tracking_filter::LinearTrackingFilter;
