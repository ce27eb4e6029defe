use drone_ipc::detection::first_within;
use drone_ipc::point::{Point, NUM_TARGETS};
use drone_ipc::spawner::Spawner;

/// Fixed-size set of targets. A consumed target leaves the set and a fresh
/// one joins at the end, so the set never shrinks.
pub struct TargetSet<S: Spawner> {
    spawner: S,
    points: Vec<Point>,
}

impl<S: Spawner> TargetSet<S> {
    pub fn new(mut spawner: S) -> TargetSet<S> {
        let points = (0..NUM_TARGETS).map(|_| spawner.target()).collect();
        TargetSet { spawner, points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Consumes the first target within `radius` of the drone and returns it.
    pub fn consume_near(&mut self, x: f64, y: f64, radius: f64) -> Option<Point> {
        let i = first_within(x, y, &self.points, radius)?;
        let mut consumed = self.points.remove(i);
        consumed.reached = true;
        self.points.push(self.spawner.target());
        Some(consumed)
    }
}
