//! Map cost backed by the nearest point cache

use log::debug;

use crate::common::{CenteredBox, MapCostInterface, Obstacles, PlannerResult, Point2D, Pose};
use crate::mapping::nearest_point_cache::NearestPointCache;

/// Production map cost: clearance from the nearest point cache plus a freshness flag
#[derive(Debug, Clone)]
pub struct DistanceMapCost {
    cache: NearestPointCache,
    updated: bool,
}

impl DistanceMapCost {
    pub fn new(cache: NearestPointCache) -> Self {
        Self {
            cache,
            updated: false,
        }
    }

    pub fn with_bounds(
        hitbox: CenteredBox,
        map_size: CenteredBox,
        resolution: f64,
    ) -> PlannerResult<Self> {
        Ok(Self::new(NearestPointCache::new(hitbox, map_size, resolution)?))
    }

    pub fn cache(&self) -> &NearestPointCache {
        &self.cache
    }

    /// Replace the obstacle set. The map counts as updated until marked stale.
    pub fn set_map(&mut self, obstacles: &Obstacles) {
        if obstacles.is_empty() {
            debug!("obstacle set is empty, treating surroundings as clear");
        }
        self.cache.set_map(&obstacles.points);
        self.updated = true;
    }

    /// Drop points that fall inside the vehicle's own hitbox. Returns how many were removed.
    pub fn remove_self_collisions(&self, obstacles: &mut Obstacles) -> usize {
        let before = obstacles.len();
        obstacles
            .points
            .retain(|p: &Point2D| !self.cache.get_collision(p));
        before - obstacles.len()
    }
}

impl MapCostInterface for DistanceMapCost {
    fn distance_cost(&self, pose: &Pose) -> f64 {
        self.cache.get_collision_distance(pose)
    }

    fn is_map_updated(&self) -> bool {
        self.updated
    }

    fn set_map_stale(&mut self) {
        self.updated = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::nearest_point_cache::DEFAULT_CACHE_RESOLUTION;

    fn create_map_cost() -> DistanceMapCost {
        DistanceMapCost::with_bounds(
            CenteredBox::new(0.4, 0.1, 0.15, 0.15),
            CenteredBox::new(4.0, 1.0, 3.0, 3.0),
            DEFAULT_CACHE_RESOLUTION,
        )
        .unwrap()
    }

    #[test]
    fn test_freshness_tracking() {
        let mut map = create_map_cost();
        assert!(!map.is_map_updated());
        map.set_map(&Obstacles::new());
        assert!(map.is_map_updated());
        map.set_map_stale();
        assert!(!map.is_map_updated());
    }

    #[test]
    fn test_costs_match_cache() {
        let mut map = create_map_cost();
        map.set_map(&Obstacles::from_xy(&[2.0], &[0.0]));
        let poses = [Pose::origin(), Pose::new(1.7, 0.0, 0.0)];
        let costs = map.distance_costs(&poses);
        assert!((costs[0] - 1.6).abs() < 1e-9);
        assert!(costs[1] <= 0.0);
    }

    #[test]
    fn test_remove_self_collisions() {
        let map = create_map_cost();
        let mut obstacles = Obstacles::from_xy(&[0.1, 1.0, -0.05], &[0.0, 0.0, 0.1]);
        assert_eq!(map.remove_self_collisions(&mut obstacles), 2);
        assert_eq!(obstacles.points, vec![Point2D::new(1.0, 0.0)]);
    }
}
