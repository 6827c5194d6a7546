//! Rate-limited tracking of a scalar setpoint
//!
//! The value moves toward its target no faster than the configured rates
//! and never leaves `[val_min, val_max]`. Used for steering-rate limits.

use log::warn;

use crate::common::{PlannerError, PlannerResult};

#[derive(Debug, Clone)]
pub struct LinearTrackingFilter {
    val: f64,
    target: f64,
    val_min: f64,
    val_max: f64,
    rate_min: f64,
    rate_max: f64,
    last_update: f64,
}

impl LinearTrackingFilter {
    /// # Arguments
    /// * `init_val` - Starting value, also the initial target
    /// * `val_min`, `val_max` - Value limits
    /// * `rate_min` - Most negative change per second (<= 0)
    /// * `rate_max` - Most positive change per second (>= 0)
    pub fn new(
        init_val: f64,
        val_min: f64,
        val_max: f64,
        rate_min: f64,
        rate_max: f64,
    ) -> PlannerResult<Self> {
        if !(val_min < val_max) {
            return Err(PlannerError::InvalidParameter(format!(
                "val_min ({}) must be less than val_max ({})",
                val_min, val_max
            )));
        }
        if !(rate_min <= 0.0 && rate_max >= 0.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "rate limits must bracket zero, got [{}, {}]",
                rate_min, rate_max
            )));
        }
        let val = init_val.clamp(val_min, val_max);
        Ok(Self {
            val,
            target: val,
            val_min,
            val_max,
            rate_min,
            rate_max,
            last_update: 0.0,
        })
    }

    /// Symmetric limits: `[-limit, limit]` and `[-rate, rate]`
    pub fn symmetric(init_val: f64, limit: f64, rate: f64) -> PlannerResult<Self> {
        Self::new(init_val, -limit, limit, -rate, rate)
    }

    pub fn value(&self) -> f64 {
        self.val
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn last_update_time(&self) -> f64 {
        self.last_update
    }

    pub fn set_target(&mut self, target: f64) {
        self.target = target;
    }

    /// Advance by an absolute timestamp. Backward jumps leave the value untouched.
    pub fn update(&mut self, setpoint: f64, t: f64) {
        self.target = setpoint;
        if self.last_update > 0.0 {
            let dt = t - self.last_update;
            if dt > 0.0 {
                self.step(dt);
            } else if dt < 0.0 {
                warn!(
                    "linear tracking filter found jump backwards in time {} {}",
                    self.last_update, t
                );
            }
        }
        self.last_update = t;
    }

    /// Advance by `dt` seconds toward the current target
    pub fn update_raw_dt(&mut self, dt: f64) {
        self.step(dt);
        self.last_update += dt;
    }

    pub fn reset(&mut self, value: f64, t: f64) {
        self.val = value.clamp(self.val_min, self.val_max);
        self.target = self.val;
        self.last_update = t;
    }

    fn step(&mut self, dt: f64) {
        let l1 = self.val + self.rate_min * dt;
        let l2 = self.val + self.rate_max * dt;
        self.val = self
            .target
            .clamp(l1.min(l2), l1.max(l2))
            .clamp(self.val_min, self.val_max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_step() {
        let mut filter = LinearTrackingFilter::symmetric(0.0, 1.0, 2.0).unwrap();
        filter.set_target(0.5);
        filter.update_raw_dt(0.1);
        assert!((filter.value() - 0.2).abs() < 1e-12);
        filter.update_raw_dt(1.0);
        assert!((filter.value() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_value_limits() {
        let mut filter = LinearTrackingFilter::symmetric(0.0, 0.3, 100.0).unwrap();
        filter.set_target(-5.0);
        filter.update_raw_dt(1.0);
        assert!((filter.value() + 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_update_ignores_backward_time() {
        let mut filter = LinearTrackingFilter::symmetric(0.0, 1.0, 1.0).unwrap();
        filter.reset(0.0, 10.0);
        filter.update(1.0, 10.5);
        assert!((filter.value() - 0.5).abs() < 1e-12);
        filter.update(1.0, 10.2);
        assert!((filter.value() - 0.5).abs() < 1e-12);
        assert_eq!(filter.last_update_time(), 10.2);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        assert!(LinearTrackingFilter::new(0.0, 1.0, -1.0, -1.0, 1.0).is_err());
        assert!(LinearTrackingFilter::new(0.0, -1.0, 1.0, 0.5, 1.0).is_err());
    }
}
