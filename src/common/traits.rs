//! Common traits defining the seams between map and planners

use crate::common::types::*;

/// Cost of poses with respect to the current obstacle map.
///
/// Costs are clearance-like: positive when the pose is free (larger is
/// farther from obstacles, `f64::INFINITY` when nothing is mapped), and
/// `<= 0` when the pose is in collision.
pub trait MapCostInterface {
    /// Cost of a single pose relative to the vehicle at plan time zero
    fn distance_cost(&self, pose: &Pose) -> f64;

    /// Cost of each pose in a sequence
    fn distance_costs(&self, poses: &[Pose]) -> Vec<f64> {
        poses.iter().map(|pose| self.distance_cost(pose)).collect()
    }

    /// Cost of each point of a path
    fn path_distance_costs(&self, path: &[PathPoint]) -> Vec<f64> {
        path.iter().map(|point| self.distance_cost(&point.pose)).collect()
    }

    /// Whether the obstacle data changed since it was last marked stale
    fn is_map_updated(&self) -> bool;

    /// Mark the current obstacle data as consumed
    fn set_map_stale(&mut self);
}

/// Trait for reactive local planners
pub trait LocalPlanner {
    /// Run one bounded search against the current map and return the best path
    fn plan(&mut self, map: &dyn MapCostInterface) -> PlannedPath;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct WallAhead {
        updated: bool,
    }

    impl MapCostInterface for WallAhead {
        fn distance_cost(&self, pose: &Pose) -> f64 {
            2.0 - pose.x
        }

        fn is_map_updated(&self) -> bool {
            self.updated
        }

        fn set_map_stale(&mut self) {
            self.updated = false;
        }
    }

    #[test]
    fn test_vectorized_costs_follow_single_pose_cost() {
        let map = WallAhead { updated: true };
        let poses = [Pose::origin(), Pose::new(2.5, 0.0, 0.0)];
        assert_eq!(map.distance_costs(&poses), vec![2.0, -0.5]);

        let path = [PathPoint::new(Pose::new(1.0, 0.0, 0.0), 1.0, 0.0, 1.0, 1.0)];
        assert_eq!(map.path_distance_costs(&path), vec![1.0]);
    }

    #[test]
    fn test_freshness_flag() {
        let mut map = WallAhead { updated: true };
        assert!(map.is_map_updated());
        map.set_map_stale();
        assert!(!map.is_map_updated());
    }
}
