// Local planner demo
//
// Runs the configured planner at a fixed rate against a synthetic scene:
// a wall with a gap scrolls toward the vehicle while a perception thread
// publishes vehicle-relative obstacle points.
//
// usage: local_planner [config.yaml]

use std::env;
use std::path::Path;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{error, info, warn};

use rr_local_planner::mission_planning::PlanningLoop;
use rr_local_planner::{Obstacles, PlannerConfig, Point2D};

const CYCLES: usize = 40;
const PLAN_PERIOD: Duration = Duration::from_millis(100);
const SENSOR_PERIOD: Duration = Duration::from_millis(50);
const SCROLL_SPEED: f64 = 1.0; // m/s

/// Wall across the path at `distance` with a gap left of centre
fn wall_with_gap(distance: f64) -> Obstacles {
    let mut obstacles = Obstacles::new();
    let mut y = -3.0;
    while y <= 3.0 {
        if !(0.3..=1.3).contains(&y) {
            obstacles.push(Point2D::new(distance, y));
        }
        y += 0.05;
    }
    obstacles
}

fn load_config() -> PlannerConfig {
    match env::args().nth(1) {
        Some(path) => match PlannerConfig::load(Path::new(&path)) {
            Ok(config) => config,
            Err(e) => {
                error!("failed to load {}: {}", path, e);
                process::exit(1);
            }
        },
        None => {
            info!("no configuration given, using built-in example");
            PlannerConfig::example()
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config();
    let mut planning = match PlanningLoop::from_config(&config) {
        Ok(planning) => planning,
        Err(e) => {
            error!("invalid configuration: {}", e);
            process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let slot = planning.obstacle_slot();
    let sensor_running = Arc::clone(&running);
    let sensor = thread::spawn(move || {
        let start = Instant::now();
        while sensor_running.load(Ordering::Relaxed) {
            let distance = 5.0 - SCROLL_SPEED * start.elapsed().as_secs_f64();
            if distance > 0.5 {
                slot.publish(wall_with_gap(distance));
            }
            thread::sleep(SENSOR_PERIOD);
        }
    });

    let mut next_cycle = Instant::now();
    for cycle in 0..CYCLES {
        next_cycle += PLAN_PERIOD;

        match planning.spin_once() {
            Some(plan) => {
                let (speed, steer) = plan.command();
                let end = plan.final_pose();
                info!(
                    "cycle {:2}: speed {:.2} m/s, steer {:+.3} rad, path ends at ({:.2}, {:.2})",
                    cycle, speed, steer, end.x, end.y
                );
            }
            None => warn!("cycle {:2}: no new obstacles, keeping previous command", cycle),
        }
        planning.set_map_stale();

        let now = Instant::now();
        if now > next_cycle {
            warn!("cycle {:2} overran by {:?}", cycle, now - next_cycle);
            next_cycle = now;
        } else {
            thread::sleep(next_cycle - now);
        }
    }

    running.store(false, Ordering::Relaxed);
    if sensor.join().is_err() {
        error!("sensor thread panicked");
    }
}
