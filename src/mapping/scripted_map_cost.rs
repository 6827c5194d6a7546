//! Scripted map cost for exercising planners without a real obstacle cache

use crate::common::{MapCostInterface, Pose};

type ClearanceFn = Box<dyn Fn(&Pose) -> f64 + Send + Sync>;

/// Map cost whose clearance is an arbitrary function of the pose
pub struct ScriptedMapCost {
    clearance: ClearanceFn,
    updated: bool,
}

impl ScriptedMapCost {
    pub fn from_fn<F>(clearance: F) -> Self
    where
        F: Fn(&Pose) -> f64 + Send + Sync + 'static,
    {
        Self {
            clearance: Box::new(clearance),
            updated: true,
        }
    }

    /// Nothing mapped anywhere
    pub fn clear() -> Self {
        Self::from_fn(|_| f64::INFINITY)
    }

    /// Every pose collides
    pub fn blocked() -> Self {
        Self::from_fn(|_| -1.0)
    }

    /// A wall across the path at `x = distance`; clearance is the gap to it
    pub fn wall_ahead(distance: f64) -> Self {
        Self::from_fn(move |pose| distance - pose.x)
    }

    /// A square block of half-width `half_width` centred on (x, y)
    pub fn block_at(x: f64, y: f64, half_width: f64) -> Self {
        Self::from_fn(move |pose| {
            let dx = (pose.x - x).abs() - half_width;
            let dy = (pose.y - y).abs() - half_width;
            if dx <= 0.0 && dy <= 0.0 {
                dx.max(dy)
            } else {
                dx.max(0.0).hypot(dy.max(0.0))
            }
        })
    }

    pub fn set_map_updated(&mut self) {
        self.updated = true;
    }
}

impl MapCostInterface for ScriptedMapCost {
    fn distance_cost(&self, pose: &Pose) -> f64 {
        (self.clearance)(pose)
    }

    fn is_map_updated(&self) -> bool {
        self.updated
    }

    fn set_map_stale(&mut self) {
        self.updated = false;
    }
}
