//! Common types used throughout rr_local_planner

use std::f64::consts::PI;

use nalgebra::{Rotation2, Vector2};

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

/// Vehicle pose in the local frame at plan time zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading [rad], kept in (-pi, pi]
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self {
            x,
            y,
            theta: normalize_angle(theta),
        }
    }

    pub fn origin() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            theta: 0.0,
        }
    }

    pub fn position(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Express a world-frame point in this pose's body frame
    pub fn to_local(&self, point: &Point2D) -> Point2D {
        let delta = Vector2::new(point.x - self.x, point.y - self.y);
        Point2D::from(Rotation2::new(-self.theta) * delta)
    }
}

/// Normalize angle to (-PI, PI]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a > PI {
        a -= 2.0 * PI;
    } else if a <= -PI {
        a += 2.0 * PI;
    }
    a
}

/// A pose along a planned path with the command active there
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub pose: Pose,
    /// Commanded speed [m/s]
    pub speed: f64,
    /// Commanded steering angle [rad], positive turns right
    pub steer: f64,
    /// Arc length from the plan origin [m]
    pub distance: f64,
    /// Time from the plan origin [s]
    pub time: f64,
}

impl PathPoint {
    pub fn new(pose: Pose, speed: f64, steer: f64, distance: f64, time: f64) -> Self {
        Self {
            pose,
            speed,
            steer,
            distance,
            time,
        }
    }
}

/// Rectangle described by its clearances around a reference point, aligned with the heading.
///
/// Used both as the vehicle hitbox and as the bound of the nearest point cache.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CenteredBox {
    pub front: f64,
    pub back: f64,
    pub left: f64,
    pub right: f64,
}

impl CenteredBox {
    pub fn new(front: f64, back: f64, left: f64, right: f64) -> Self {
        Self {
            front,
            back,
            left,
            right,
        }
    }

    /// Clearances are non-negative and the box has area
    pub fn is_valid(&self) -> bool {
        let sides = [self.front, self.back, self.left, self.right];
        sides.iter().all(|s| s.is_finite() && *s >= 0.0)
            && self.front + self.back > 0.0
            && self.left + self.right > 0.0
    }

    /// Boundary-inclusive containment of a point given in the box frame
    pub fn contains(&self, point: &Point2D) -> bool {
        point.x <= self.front
            && point.x >= -self.back
            && point.y <= self.left
            && point.y >= -self.right
    }

    /// Distance from the box boundary to a point in the box frame.
    ///
    /// Positive outside, zero on the boundary, negative (penetration depth) inside.
    pub fn signed_distance(&self, point: &Point2D) -> f64 {
        let dx = (point.x - self.front).max(-self.back - point.x).max(0.0);
        let dy = (point.y - self.left).max(-self.right - point.y).max(0.0);
        if dx > 0.0 || dy > 0.0 {
            return dx.hypot(dy);
        }
        let depth = (self.front - point.x)
            .min(point.x + self.back)
            .min(self.left - point.y)
            .min(point.y + self.right);
        -depth
    }

    /// Distance from the reference point to the farthest corner
    pub fn corner_distance(&self) -> f64 {
        self.front.max(self.back).hypot(self.left.max(self.right))
    }
}

/// One leg of a candidate trajectory
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSegment {
    /// Steering angle [rad]
    pub steer: f64,
    /// Requested speed [m/s]
    pub speed: f64,
    /// Arc length of the leg [m]
    pub length: f64,
}

impl ControlSegment {
    pub fn new(steer: f64, speed: f64, length: f64) -> Self {
        Self {
            steer,
            speed,
            length,
        }
    }
}

/// Result of one planning cycle: a non-empty path and its cost
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPath {
    path: Vec<PathPoint>,
    cost: f64,
}

impl PlannedPath {
    /// An empty path degenerates to standing still at the origin
    pub fn new(mut path: Vec<PathPoint>, cost: f64) -> Self {
        if path.is_empty() {
            path.push(PathPoint::new(Pose::origin(), 0.0, 0.0, 0.0, 0.0));
        }
        Self { path, cost }
    }

    pub fn path(&self) -> &[PathPoint] {
        &self.path
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    /// Always false; kept for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }

    /// (speed, steer) to hand to the actuation layer
    pub fn command(&self) -> (f64, f64) {
        let first = &self.path[0];
        (first.speed, first.steer)
    }

    pub fn final_pose(&self) -> Pose {
        self.path[self.path.len() - 1].pose
    }

    pub fn total_length(&self) -> f64 {
        self.path[self.path.len() - 1].distance
    }
}

/// Obstacle point set in the vehicle frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Obstacles {
    pub points: Vec<Point2D>,
}

impl Obstacles {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn from_xy(x: &[f64], y: &[f64]) -> Self {
        let points = x
            .iter()
            .zip(y.iter())
            .map(|(&x, &y)| Point2D::new(x, y))
            .collect();
        Self { points }
    }

    pub fn push(&mut self, point: Point2D) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
