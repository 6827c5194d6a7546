//! Kinematic bicycle model for the local planner
//!
//! Expands a sequence of control segments into a path sampled at a fixed
//! distance increment. Positive steering turns right.

use std::f64::consts::FRAC_PI_2;

use log::trace;
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use crate::common::{ControlSegment, PathPoint, PlannerError, PlannerResult, Pose};
use crate::control::LinearTrackingFilter;

/// Steering magnitudes below this are integrated as straight lines [rad]
const STEER_EPSILON: f64 = 1e-6;
/// Speeds below this produce no motion [m/s]
const SPEED_EPSILON: f64 = 1e-9;
/// Leftover arc length ignored at the end of a segment [m]
const LENGTH_EPSILON: f64 = 1e-9;

/// Vehicle constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BicycleModelConfig {
    /// Distance between axles [m]
    pub wheel_base: f64,
    /// Maximum lateral acceleration [m/s^2]
    pub lateral_accel: f64,
    /// Path sampling step [m]
    pub distance_increment: f64,
    /// Maximum speed [m/s]
    pub max_speed: f64,
    /// Maximum steering rate [rad/s]
    pub steering_speed: f64,
    /// Number of distance increments in each control segment
    pub segment_sections: Vec<usize>,
}

impl Default for BicycleModelConfig {
    fn default() -> Self {
        Self {
            wheel_base: 0.37,
            lateral_accel: 3.0,
            distance_increment: 0.05,
            max_speed: 2.0,
            steering_speed: 4.0,
            segment_sections: vec![10, 15, 20],
        }
    }
}

impl BicycleModelConfig {
    pub fn validate(&self) -> PlannerResult<()> {
        let positive = [
            ("wheel_base", self.wheel_base),
            ("lateral_accel", self.lateral_accel),
            ("distance_increment", self.distance_increment),
            ("max_speed", self.max_speed),
            ("steering_speed", self.steering_speed),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PlannerError::InvalidParameter(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.segment_sections.is_empty() {
            return Err(PlannerError::InvalidParameter(
                "segment_sections must not be empty".to_string(),
            ));
        }
        if self.segment_sections.iter().any(|&s| s == 0) {
            return Err(PlannerError::InvalidParameter(
                "segment_sections entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bicycle kinematic motion model
#[derive(Debug, Clone)]
pub struct BicycleModel {
    config: BicycleModelConfig,
    /// Steering actuator limits, reset to the start steer for each roll-out
    steering: LinearTrackingFilter,
}

impl BicycleModel {
    pub fn new(config: BicycleModelConfig) -> PlannerResult<Self> {
        config.validate()?;
        let steering = LinearTrackingFilter::symmetric(0.0, FRAC_PI_2, config.steering_speed)?;
        Ok(Self { config, steering })
    }

    pub fn config(&self) -> &BicycleModelConfig {
        &self.config
    }

    pub fn max_speed(&self) -> f64 {
        self.config.max_speed
    }

    pub fn distance_increment(&self) -> f64 {
        self.config.distance_increment
    }

    /// Number of control segments in a candidate trajectory
    pub fn segment_count(&self) -> usize {
        self.config.segment_sections.len()
    }

    /// Nominal arc length of a full trajectory [m]
    pub fn total_length(&self) -> f64 {
        self.segment_lengths().iter().sum()
    }

    pub fn segment_lengths(&self) -> Vec<f64> {
        self.config
            .segment_sections
            .iter()
            .map(|&n| n as f64 * self.config.distance_increment)
            .collect()
    }

    /// Highest speed allowed at a steering angle: `min(max_speed, sqrt(a_lat * r))`
    pub fn speed_limit(&self, steer: f64) -> f64 {
        if steer.abs() < STEER_EPSILON {
            return self.config.max_speed;
        }
        let radius = self.config.wheel_base / steer.abs().min(FRAC_PI_2).sin();
        self.config
            .max_speed
            .min((self.config.lateral_accel * radius).sqrt())
    }

    /// Pair (steer, speed) controls with the configured segment lengths
    pub fn segments_from_controls(&self, controls: &[(f64, f64)]) -> Vec<ControlSegment> {
        controls
            .iter()
            .zip(self.segment_lengths())
            .map(|(&(steer, speed), length)| ControlSegment::new(steer, speed, length))
            .collect()
    }

    /// Advance a pose by `dt` seconds at constant speed and steering
    ///
    /// # Arguments
    /// * `pose` - Current pose
    /// * `speed` - Speed [m/s]
    /// * `steer` - Steering angle [rad], positive turns right
    /// * `dt` - Time step [s]
    pub fn step(&self, pose: &Pose, speed: f64, steer: f64, dt: f64) -> Pose {
        let (dx, dy, dtheta) = if steer.abs() < STEER_EPSILON {
            (speed * dt, 0.0, 0.0)
        } else {
            let radius = self.config.wheel_base / steer.abs().sin();
            let swept = speed * dt / radius;
            let lateral = radius * (1.0 - swept.cos());
            let dy = if steer > 0.0 { -lateral } else { lateral };
            let dtheta = speed / self.config.wheel_base * (-steer).sin() * dt;
            (radius * swept.sin(), dy, dtheta)
        };

        let delta = Rotation2::new(pose.theta) * Vector2::new(dx, dy);
        Pose::new(pose.x + delta.x, pose.y + delta.y, pose.theta + dtheta)
    }

    /// Roll out segments from the origin, starting with the first segment's steering
    pub fn roll_out(&self, segments: &[ControlSegment]) -> Vec<PathPoint> {
        let start_steer = segments.first().map_or(0.0, |s| s.steer);
        self.roll_out_from(Pose::origin(), start_steer, segments)
    }

    /// Roll out segments from an arbitrary pose and steering angle.
    ///
    /// The first point is the start pose. Each segment then adds points every
    /// `distance_increment` of arc length (the last one possibly shorter). Segments
    /// whose clamped speed is zero add nothing. Steering moves toward each
    /// segment's target at no more than `steering_speed`.
    pub fn roll_out_from(
        &self,
        start: Pose,
        start_steer: f64,
        segments: &[ControlSegment],
    ) -> Vec<PathPoint> {
        let ds = self.config.distance_increment;
        let capacity = segments
            .iter()
            .map(|s| (s.length / ds).ceil().max(0.0) as usize)
            .sum::<usize>()
            + 1;
        let mut points = Vec::with_capacity(capacity);

        let mut steering = self.steering.clone();
        steering.reset(start_steer, 0.0);

        let first_speed = segments.first().map_or(0.0, |s| self.clamp_speed(s));
        points.push(PathPoint::new(start, first_speed, steering.value(), 0.0, 0.0));

        let mut pose = start;
        let mut distance = 0.0;
        let mut time = 0.0;
        for segment in segments {
            let speed = self.clamp_speed(segment);
            if speed < SPEED_EPSILON || segment.length <= 0.0 {
                trace!("segment {:?} produces no motion", segment);
                continue;
            }
            steering.set_target(segment.steer);

            let mut travelled = 0.0;
            while segment.length - travelled > LENGTH_EPSILON {
                let step = ds.min(segment.length - travelled);
                let dt = step / speed;
                steering.update_raw_dt(dt);
                pose = self.step(&pose, speed, steering.value(), dt);
                travelled += step;
                distance += step;
                time += dt;
                points.push(PathPoint::new(pose, speed, steering.value(), distance, time));
            }
        }

        points
    }

    fn clamp_speed(&self, segment: &ControlSegment) -> f64 {
        segment.speed.min(self.speed_limit(segment.steer)).max(0.0)
    }
}
