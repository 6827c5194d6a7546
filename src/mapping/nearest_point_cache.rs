//! Nearest obstacle cache for fast collision distance queries
//!
//! The area around the vehicle is discretized into a grid. Every cell close
//! enough to an obstacle to matter for collision (the "seeded" cells) keeps the
//! full list of obstacle points that could touch the hitbox from there. All other
//! cells learn their nearest obstacle by breadth-first propagation from the
//! seeded cells. A query is then a single cell lookup.
//!
//! Cells and obstacle points refer to each other through integer indices into
//! flat arrays, so a rebuild only clears and refills them.

use std::collections::VecDeque;

use itertools::iproduct;
use log::debug;
use ordered_float::OrderedFloat;

use crate::common::{CenteredBox, PlannerError, PlannerResult, Point2D, Pose};

/// Default grid resolution [m]
pub const DEFAULT_CACHE_RESOLUTION: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheEntry {
    /// Cell centre in the vehicle frame
    location: Point2D,
    /// Nearest obstacle point (index into the point arena)
    nearest_point: Option<usize>,
    /// Points close enough to check for collision (index into the candidate sets)
    candidates: Option<usize>,
    /// Cell this entry was reached from during propagation
    parent: Option<usize>,
    /// Within collision reach of some obstacle
    seeded: bool,
}

impl CacheEntry {
    fn new(location: Point2D) -> Self {
        Self {
            location,
            nearest_point: None,
            candidates: None,
            parent: None,
            seeded: false,
        }
    }

    fn clear(&mut self) {
        self.nearest_point = None;
        self.candidates = None;
        self.parent = None;
        self.seeded = false;
    }
}

/// Per-cell nearest obstacle lookup over a bounded rectangle
#[derive(Debug, Clone)]
pub struct NearestPointCache {
    hitbox: CenteredBox,
    map_size: CenteredBox,
    resolution: f64,
    hitbox_corner_dist: f64,
    seed_radius: f64,
    rows_back: usize,
    rows: usize,
    cols_right: usize,
    cols: usize,
    cache: Vec<CacheEntry>,
    points: Vec<Point2D>,
    candidate_sets: Vec<Vec<usize>>,
    buckets: Vec<Vec<usize>>,
    cache_updates: VecDeque<usize>,
}

impl NearestPointCache {
    /// Create an empty cache.
    ///
    /// # Arguments
    /// * `hitbox` - Footprint of the vehicle around its reference point
    /// * `map_size` - Extent of the cached area. Paths must not leave it.
    /// * `resolution` - Grid cell size [m]
    pub fn new(
        hitbox: CenteredBox,
        map_size: CenteredBox,
        resolution: f64,
    ) -> PlannerResult<Self> {
        if !hitbox.is_valid() {
            return Err(PlannerError::InvalidParameter(format!(
                "hitbox {:?} must have non-negative sides and non-zero area",
                hitbox
            )));
        }
        if !map_size.is_valid() {
            return Err(PlannerError::InvalidParameter(format!(
                "map_size {:?} must have non-negative sides and non-zero area",
                map_size
            )));
        }
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(PlannerError::InvalidParameter(format!(
                "cache resolution must be positive, got {}",
                resolution
            )));
        }

        let rows_back = (map_size.back / resolution).ceil() as usize;
        let rows_front = (map_size.front / resolution).ceil() as usize;
        let cols_right = (map_size.right / resolution).ceil() as usize;
        let cols_left = (map_size.left / resolution).ceil() as usize;
        let rows = rows_back + rows_front + 1;
        let cols = cols_right + cols_left + 1;
        let hitbox_corner_dist = hitbox.corner_distance();

        let mut cache = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let x = (row as f64 - rows_back as f64) * resolution;
                let y = (col as f64 - cols_right as f64) * resolution;
                cache.push(CacheEntry::new(Point2D::new(x, y)));
            }
        }

        Ok(Self {
            hitbox,
            map_size,
            resolution,
            hitbox_corner_dist,
            // Poses anywhere inside a cell must still see every point that can touch the hitbox
            seed_radius: hitbox_corner_dist + resolution,
            rows_back,
            rows,
            cols_right,
            cols,
            buckets: vec![Vec::new(); rows * cols],
            cache,
            points: Vec::new(),
            candidate_sets: Vec::new(),
            cache_updates: VecDeque::new(),
        })
    }

    pub fn hitbox(&self) -> &CenteredBox {
        &self.hitbox
    }

    pub fn map_size(&self) -> &CenteredBox {
        &self.map_size
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn hitbox_corner_dist(&self) -> f64 {
        self.hitbox_corner_dist
    }

    pub fn cell_count(&self) -> usize {
        self.cache.len()
    }

    /// Rebuild the cache from a new obstacle set. Nothing from the previous set survives.
    pub fn set_map(&mut self, obstacles: &[Point2D]) {
        self.cache.iter_mut().for_each(CacheEntry::clear);
        self.buckets.iter_mut().for_each(Vec::clear);
        self.candidate_sets.clear();
        self.cache_updates.clear();
        self.points.clear();

        let reach = Self::expanded(&self.map_size, self.seed_radius);
        self.points.extend(
            obstacles
                .iter()
                .filter(|p| p.x.is_finite() && p.y.is_finite())
                .filter(|p| reach.contains(p)),
        );
        let dropped = obstacles.len() - self.points.len();

        for (i, point) in self.points.iter().enumerate() {
            let index = self.get_cache_index(point.x, point.y);
            self.buckets[index].push(i);
        }

        let seeded = self.seed_cells();
        let visited = self.propagate();

        debug!(
            "nearest point cache rebuilt: {} points kept, {} dropped, {} seeded cells, {}/{} cells visited",
            self.points.len(),
            dropped,
            seeded,
            visited,
            self.cache.len()
        );
    }

    /// Shortest distance from the hitbox at `pose` to the nearest obstacle.
    ///
    /// Returns `f64::INFINITY` with no obstacle in the map and a value `<= 0` when
    /// an obstacle lies inside the hitbox (exactly 0 on its boundary).
    pub fn get_collision_distance(&self, pose: &Pose) -> f64 {
        let entry = &self.cache[self.get_cache_index(pose.x, pose.y)];
        match (entry.seeded, entry.candidates, entry.nearest_point) {
            (true, Some(set), _) => self.candidate_sets[set]
                .iter()
                .map(|&i| self.clearance(pose, &self.points[i]))
                .fold(f64::INFINITY, f64::min),
            (_, _, Some(nearest)) => self.clearance(pose, &self.points[nearest]),
            _ => f64::INFINITY,
        }
    }

    /// Whether a point in the vehicle frame is inside the vehicle's current hitbox
    pub fn get_collision(&self, relative_point: &Point2D) -> bool {
        self.hitbox.contains(relative_point)
    }

    /// Euclidean distance between two points
    pub fn dist(p1: &Point2D, p2: &Point2D) -> f64 {
        p1.distance(p2)
    }

    /// Nearest obstacle point recorded for the cell containing (x, y)
    pub fn nearest_point(&self, x: f64, y: f64) -> Option<Point2D> {
        self.cache[self.get_cache_index(x, y)]
            .nearest_point
            .map(|i| self.points[i])
    }

    /// Cell the entry containing (x, y) was reached from, as its centre location
    pub fn parent_location(&self, x: f64, y: f64) -> Option<Point2D> {
        self.cache[self.get_cache_index(x, y)]
            .parent
            .map(|p| self.cache[p].location)
    }

    /// Grid index for a location, clamped to the cached rectangle
    pub fn get_cache_index(&self, x: f64, y: f64) -> usize {
        let (row, col) = self.get_cell(x, y);
        row * self.cols + col
    }

    /// Centre of the cell at a grid index
    pub fn get_point_from_index(&self, index: usize) -> Point2D {
        self.cache[index.min(self.cache.len() - 1)].location
    }

    fn get_cell(&self, x: f64, y: f64) -> (usize, usize) {
        let row = Self::clamp_index(x / self.resolution, self.rows_back, self.rows);
        let col = Self::clamp_index(y / self.resolution, self.cols_right, self.cols);
        (row, col)
    }

    fn clamp_index(scaled: f64, offset: usize, len: usize) -> usize {
        let index = scaled.round() + offset as f64;
        if index.is_nan() || index <= 0.0 {
            0
        } else {
            (index as usize).min(len - 1)
        }
    }

    fn expanded(area: &CenteredBox, margin: f64) -> CenteredBox {
        CenteredBox::new(
            area.front + margin,
            area.back + margin,
            area.left + margin,
            area.right + margin,
        )
    }

    /// Cells within `radius` cells of (row, col), clipped to the grid
    fn neighborhood(&self, row: usize, col: usize, radius: usize) -> impl Iterator<Item = usize> {
        let rows = row.saturating_sub(radius)..(row + radius + 1).min(self.rows);
        let cols = col.saturating_sub(radius)..(col + radius + 1).min(self.cols);
        let width = self.cols;
        iproduct!(rows, cols).map(move |(r, c)| r * width + c)
    }

    /// Mark and fill every cell whose centre is within the seed radius of an obstacle.
    /// Returns the number of seeded cells.
    fn seed_cells(&mut self) -> usize {
        let reach = (self.seed_radius / self.resolution).ceil() as usize + 1;

        for point in &self.points {
            let (row, col) = self.get_cell(point.x, point.y);
            let cells: Vec<usize> = self.neighborhood(row, col, reach).collect();
            for cell in cells {
                if Self::dist(&self.cache[cell].location, point) <= self.seed_radius {
                    self.cache[cell].seeded = true;
                }
            }
        }

        // Index order keeps rebuilds from the same obstacle set identical
        let mut seeded = 0;
        for cell in 0..self.cache.len() {
            if !self.cache[cell].seeded {
                continue;
            }
            let location = self.cache[cell].location;
            let (row, col) = (cell / self.cols, cell % self.cols);
            let candidates: Vec<usize> = self
                .neighborhood(row, col, reach)
                .flat_map(|n| self.buckets[n].iter().copied())
                .filter(|&i| Self::dist(&self.points[i], &location) <= self.seed_radius)
                .collect();

            let nearest = self.closest_of(&candidates, &location);
            let Some(nearest) = nearest else {
                self.cache[cell].seeded = false;
                continue;
            };

            let entry = &mut self.cache[cell];
            entry.nearest_point = Some(nearest);
            entry.candidates = Some(self.candidate_sets.len());
            self.candidate_sets.push(candidates);
            self.cache_updates.push_back(cell);
            seeded += 1;
        }
        seeded
    }

    /// Breadth-first fill of the remaining cells. Returns the number of cells with a nearest point.
    fn propagate(&mut self) -> usize {
        let mut visited = self.cache_updates.len();

        while let Some(cell) = self.cache_updates.pop_front() {
            let (row, col) = (cell / self.cols, cell % self.cols);
            let Some(set) = self.cache[cell].candidates else {
                continue;
            };

            let mut neighbors = [None; 4];
            if row > 0 {
                neighbors[0] = Some(cell - self.cols);
            }
            if row + 1 < self.rows {
                neighbors[1] = Some(cell + self.cols);
            }
            if col > 0 {
                neighbors[2] = Some(cell - 1);
            }
            if col + 1 < self.cols {
                neighbors[3] = Some(cell + 1);
            }

            for neighbor in neighbors.into_iter().flatten() {
                if self.cache[neighbor].nearest_point.is_some() {
                    continue;
                }
                let location = self.cache[neighbor].location;
                let nearest = self.closest_of(&self.candidate_sets[set], &location);
                let entry = &mut self.cache[neighbor];
                entry.nearest_point = nearest;
                entry.candidates = Some(set);
                entry.parent = Some(cell);
                self.cache_updates.push_back(neighbor);
                visited += 1;
            }
        }
        visited
    }

    fn closest_of(&self, candidates: &[usize], location: &Point2D) -> Option<usize> {
        candidates
            .iter()
            .copied()
            .min_by_key(|&i| OrderedFloat(Self::dist(&self.points[i], location)))
    }

    fn clearance(&self, pose: &Pose, obstacle: &Point2D) -> f64 {
        self.hitbox.signed_distance(&pose.to_local(obstacle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_cache() -> NearestPointCache {
        let hitbox = CenteredBox::new(0.4, 0.1, 0.15, 0.15);
        let map_size = CenteredBox::new(4.0, 1.0, 3.0, 3.0);
        NearestPointCache::new(hitbox, map_size, DEFAULT_CACHE_RESOLUTION).unwrap()
    }

    #[test]
    fn test_empty_map_is_clear_everywhere() {
        let mut cache = create_test_cache();
        cache.set_map(&[]);
        for pose in [Pose::origin(), Pose::new(3.0, -2.0, 1.0), Pose::new(50.0, 50.0, 0.0)] {
            assert_eq!(cache.get_collision_distance(&pose), f64::INFINITY);
        }
    }

    #[test]
    fn test_obstacle_at_cell_centre_collides() {
        let mut cache = create_test_cache();
        let obstacle = cache.get_point_from_index(cache.get_cache_index(2.0, 0.5));
        cache.set_map(&[obstacle]);

        let at_cell = Pose::new(obstacle.x, obstacle.y, 0.0);
        assert!(cache.get_collision_distance(&at_cell) <= 0.0);

        // Hitbox front reaches 0.4 m ahead of the reference point
        let behind = Pose::new(obstacle.x - 0.3, obstacle.y, 0.0);
        assert!(cache.get_collision_distance(&behind) <= 0.0);

        let rotated = Pose::new(obstacle.x, obstacle.y - 0.3, std::f64::consts::FRAC_PI_2);
        assert!(cache.get_collision_distance(&rotated) <= 0.0);
    }

    #[test]
    fn test_boundary_touch_is_exactly_zero() {
        let mut cache = create_test_cache();
        cache.set_map(&[Point2D::new(0.4, 0.0)]);
        for _ in 0..3 {
            assert_eq!(cache.get_collision_distance(&Pose::origin()), 0.0);
        }
    }

    #[test]
    fn test_clearance_grows_with_distance() {
        let mut cache = create_test_cache();
        cache.set_map(&[Point2D::new(3.5, 0.0)]);

        let mut previous = f64::NEG_INFINITY;
        for i in 0..=25 {
            let x = 2.5 - 0.1 * i as f64;
            let clearance = cache.get_collision_distance(&Pose::new(x, 0.0, 0.0));
            let true_clearance = 3.5 - (x + 0.4);
            assert!(clearance > 0.0);
            assert!((clearance - true_clearance).abs() <= cache.resolution());
            assert!(clearance >= previous - cache.resolution());
            previous = clearance;
        }
    }

    #[test]
    fn test_far_cells_report_nearest_point() {
        let mut cache = create_test_cache();
        let obstacles = [Point2D::new(3.0, 2.0), Point2D::new(-0.5, -2.5)];
        cache.set_map(&obstacles);

        assert_eq!(cache.nearest_point(2.5, 2.5), Some(obstacles[0]));
        assert_eq!(cache.nearest_point(-0.8, -2.8), Some(obstacles[1]));
        assert!(cache.parent_location(1.0, 0.0).is_some());

        let clearance = cache.get_collision_distance(&Pose::new(1.0, 0.0, 0.0));
        assert!(clearance > 0.0 && clearance.is_finite());
    }

    #[test]
    fn test_set_map_is_idempotent() {
        let mut cache = create_test_cache();
        let obstacles = [
            Point2D::new(1.0, 0.3),
            Point2D::new(2.2, -1.1),
            Point2D::new(3.7, 2.4),
            Point2D::new(-0.6, 0.9),
        ];
        cache.set_map(&obstacles);
        let first = cache.cache.clone();
        cache.set_map(&obstacles);
        assert_eq!(first, cache.cache);
    }

    #[test]
    fn test_rebuild_forgets_previous_map() {
        let mut cache = create_test_cache();
        cache.set_map(&[Point2D::new(0.2, 0.0)]);
        assert!(cache.get_collision_distance(&Pose::origin()) <= 0.0);
        cache.set_map(&[]);
        assert_eq!(cache.get_collision_distance(&Pose::origin()), f64::INFINITY);
    }

    #[test]
    fn test_out_of_range_queries_clamp() {
        let cache = create_test_cache();
        let corner = cache.get_cache_index(100.0, -100.0);
        let location = cache.get_point_from_index(corner);
        assert!((location.x - 4.0).abs() < 1e-9);
        assert!((location.y + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_get_collision_uses_unrotated_hitbox() {
        let cache = create_test_cache();
        assert!(cache.get_collision(&Point2D::new(0.3, 0.1)));
        assert!(cache.get_collision(&Point2D::new(0.4, 0.15)));
        assert!(!cache.get_collision(&Point2D::new(0.0, 0.2)));
        assert!(!cache.get_collision(&Point2D::new(-0.2, 0.0)));
    }

    #[test]
    fn test_invalid_construction_rejected() {
        let map_size = CenteredBox::new(4.0, 1.0, 3.0, 3.0);
        let flat = CenteredBox::new(0.0, 0.0, 0.1, 0.1);
        assert!(NearestPointCache::new(flat, map_size, 0.05).is_err());
        let hitbox = CenteredBox::new(0.4, 0.1, 0.15, 0.15);
        assert!(NearestPointCache::new(hitbox, map_size, 0.0).is_err());
    }
}
