use std::time::{Duration, Instant};

use drone_ipc::detection::first_within;
use drone_ipc::point::{Point, NUM_OBSTACLES};
use drone_ipc::spawner::Spawner;

pub struct ObstacleField<S: Spawner> {
    spawner: S,
    points: Vec<Point>,
    generated_at: Instant,
    regen_every: Duration,
    /// Whether the drone was inside an obstacle's radius on the last check.
    touching: bool,
}

impl<S: Spawner> ObstacleField<S> {
    pub fn new(mut spawner: S, regen_every: Duration, now: Instant) -> ObstacleField<S> {
        let points = (0..NUM_OBSTACLES).map(|_| spawner.obstacle()).collect();
        ObstacleField {
            spawner,
            points,
            generated_at: now,
            regen_every,
            touching: false,
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Replaces the whole set once it is older than the regeneration period.
    pub fn regenerate_if_due(&mut self, now: Instant) -> bool {
        if now.duration_since(self.generated_at) < self.regen_every {
            return false;
        }
        for point in self.points.iter_mut() {
            *point = self.spawner.obstacle();
        }
        self.generated_at = now;
        true
    }

    /// Returns the obstacle hit, but only when the drone has just moved into
    /// range. Staying inside counts once.
    pub fn check_collision(&mut self, x: f64, y: f64, radius: f64) -> Option<usize> {
        let hit = first_within(x, y, &self.points, radius);
        let entered = hit.is_some() && !self.touching;
        self.touching = hit.is_some();
        if entered {
            hit
        } else {
            None
        }
    }
}
