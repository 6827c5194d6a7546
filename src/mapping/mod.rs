// Obstacle maps and clearance queries

pub mod distance_map_cost;
pub mod nearest_point_cache;
pub mod scripted_map_cost;

pub use distance_map_cost::DistanceMapCost;
pub use nearest_point_cache::{NearestPointCache, DEFAULT_CACHE_RESOLUTION};
pub use scripted_map_cost::ScriptedMapCost;
