//! One-slot obstacle hand-off and the per-cycle planning pass

use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::Mutex;

use crate::common::{LocalPlanner, MapCostInterface, Obstacles, PlannedPath, PlannerResult};
use crate::config::PlannerConfig;
use crate::mapping::DistanceMapCost;
use crate::path_planning::PlannerStrategy;

#[derive(Debug, Default)]
struct SlotState {
    latest: Option<Obstacles>,
    pending: bool,
}

/// Latest obstacle set published by perception. Newer sets overwrite older ones.
#[derive(Debug, Default)]
pub struct ObstacleSlot {
    state: Mutex<SlotState>,
}

impl ObstacleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new obstacle set and mark it pending
    pub fn publish(&self, obstacles: Obstacles) {
        let mut state = self.state.lock();
        if state.pending {
            debug!("dropping unconsumed obstacle set");
        }
        state.latest = Some(obstacles);
        state.pending = true;
    }

    /// Take the pending set, clearing the flag. `None` when nothing new arrived.
    pub fn take_pending(&self) -> Option<Obstacles> {
        let mut state = self.state.lock();
        if !state.pending {
            return None;
        }
        state.pending = false;
        state.latest.take()
    }

    pub fn has_pending(&self) -> bool {
        self.state.lock().pending
    }
}

/// Obstacle map plus the configured planner
pub struct PlanningLoop {
    slot: Arc<ObstacleSlot>,
    map: DistanceMapCost,
    planner: PlannerStrategy,
}

impl PlanningLoop {
    pub fn new(map: DistanceMapCost, planner: PlannerStrategy) -> Self {
        Self {
            slot: Arc::new(ObstacleSlot::new()),
            map,
            planner,
        }
    }

    pub fn from_config(config: &PlannerConfig) -> PlannerResult<Self> {
        config.validate()?;
        let map =
            DistanceMapCost::with_bounds(config.hitbox, config.map_size, config.cache_resolution)?;
        let planner = PlannerStrategy::from_config(config)?;
        info!(
            "{} planner ready, cache {} cells",
            planner.kind(),
            map.cache().cell_count()
        );
        Ok(Self::new(map, planner))
    }

    /// Handle for the obstacle producer
    pub fn obstacle_slot(&self) -> Arc<ObstacleSlot> {
        Arc::clone(&self.slot)
    }

    pub fn map_cost(&self) -> &DistanceMapCost {
        &self.map
    }

    pub fn map_cost_mut(&mut self) -> &mut DistanceMapCost {
        &mut self.map
    }

    pub fn planner(&self) -> &PlannerStrategy {
        &self.planner
    }

    /// Rebuild the map from a pending obstacle set and plan.
    ///
    /// Returns `None` when no new obstacles were published since the last call.
    pub fn spin_once(&mut self) -> Option<PlannedPath> {
        let mut obstacles = self.slot.take_pending()?;

        let removed = self.map.remove_self_collisions(&mut obstacles);
        if removed > 0 {
            warn!("removed {} obstacle points inside the vehicle hitbox", removed);
        }
        self.map.set_map(&obstacles);

        let plan = self.planner.plan(&self.map);
        let (speed, steer) = plan.command();
        info!(
            "best cost {:.4} over {} points, command speed {:.3} steer {:.3}",
            plan.cost(),
            plan.len(),
            speed,
            steer
        );
        Some(plan)
    }

    /// Whether the map was rebuilt since it was last marked stale
    pub fn is_map_updated(&self) -> bool {
        self.map.is_map_updated()
    }

    pub fn set_map_stale(&mut self) {
        self.map.set_map_stale();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Point2D;
    use std::thread;

    fn planning_loop() -> PlanningLoop {
        PlanningLoop::from_config(&PlannerConfig::example()).unwrap()
    }

    #[test]
    fn test_slot_keeps_latest() {
        let slot = ObstacleSlot::new();
        assert!(!slot.has_pending());
        assert!(slot.take_pending().is_none());

        slot.publish(Obstacles::from_xy(&[1.0], &[0.0]));
        slot.publish(Obstacles::from_xy(&[2.0, 3.0], &[0.0, 0.0]));
        assert!(slot.has_pending());

        let taken = slot.take_pending().unwrap();
        assert_eq!(taken.len(), 2);
        assert!(!slot.has_pending());
        assert!(slot.take_pending().is_none());
    }

    #[test]
    fn test_publish_from_another_thread() {
        let slot = Arc::new(ObstacleSlot::new());
        let producer = Arc::clone(&slot);
        thread::spawn(move || producer.publish(Obstacles::from_xy(&[1.0], &[1.0])))
            .join()
            .unwrap();
        assert_eq!(slot.take_pending().unwrap().points[0], Point2D::new(1.0, 1.0));
    }

    #[test]
    fn test_spin_without_obstacles_does_nothing() {
        let mut planning = planning_loop();
        assert!(planning.spin_once().is_none());
        assert!(!planning.is_map_updated());
    }

    #[test]
    fn test_spin_plans_on_new_map() {
        let mut planning = planning_loop();
        planning.obstacle_slot().publish(Obstacles::new());

        let plan = planning.spin_once().unwrap();
        let (speed, steer) = plan.command();
        assert_eq!(steer, 0.0);
        assert!(speed > 0.0);
        assert!(planning.is_map_updated());

        planning.set_map_stale();
        assert!(!planning.is_map_updated());
        assert!(planning.spin_once().is_none());
    }

    fn assert_avoids_close_obstacle(planner_type: &str, obstacle_x: f64) {
        let mut config = PlannerConfig::example();
        config.planner_type = planner_type.to_string();
        let mut planning = PlanningLoop::from_config(&config).unwrap();

        for _ in 0..3 {
            planning
                .obstacle_slot()
                .publish(Obstacles::from_xy(&[obstacle_x], &[0.0]));
            let plan = planning.spin_once().unwrap();

            let clearances = planning.map_cost().path_distance_costs(plan.path());
            assert!(
                clearances.iter().all(|&c| c > 0.0),
                "{} plan collides with obstacle at x = {}",
                planner_type,
                obstacle_x
            );
            assert!(plan.cost() < 1000.0);
            planning.set_map_stale();
        }
    }

    #[test]
    fn test_random_sample_avoids_obstacle_just_ahead() {
        assert_avoids_close_obstacle("random_sample", 0.6);
        assert_avoids_close_obstacle("random_sample", 0.7);
    }

    #[test]
    fn test_annealing_avoids_obstacle_just_ahead() {
        assert_avoids_close_obstacle("annealing", 0.6);
        assert_avoids_close_obstacle("annealing", 0.7);
    }

    #[test]
    fn test_stands_still_when_boxed_in() {
        let mut planning = planning_loop();
        // Wall just past the hitbox front, spanning the whole turning range
        let ys: Vec<f64> = (-60..=60).map(|i| i as f64 * 0.05).collect();
        let xs = vec![0.6; ys.len()];
        planning.obstacle_slot().publish(Obstacles::from_xy(&xs, &ys));

        let plan = planning.spin_once().unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.command().0, 0.0);
    }

    #[test]
    fn test_self_collisions_are_removed() {
        let mut planning = planning_loop();
        // Origin lies inside the hitbox, the far point does not
        planning
            .obstacle_slot()
            .publish(Obstacles::from_xy(&[0.0, 4.0], &[0.0, 4.0]));

        let plan = planning.spin_once().unwrap();
        assert!(plan.cost() < 0.0);
        assert!(planning.map_cost().distance_cost(&crate::common::Pose::origin()) > 0.0);
    }
}
