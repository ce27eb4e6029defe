use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::mailbox::{MAX_TARGET_VALUE, MIN_TARGET_VALUE};
use crate::point::Point;

const OBSTACLE_MARGIN: u32 = 5;
const TARGET_MARGIN: u32 = 10;

/// Placement policy for new entities.
pub trait Spawner {
    fn obstacle(&mut self) -> Point;
    fn target(&mut self) -> Point;
}

/// Integer grid positions kept clear of the far edges.
pub struct RandomSpawner<R: Rng> {
    rng: R,
    board_size: u32,
}

impl RandomSpawner<StdRng> {
    pub fn from_entropy(board_size: f64) -> RandomSpawner<StdRng> {
        RandomSpawner::new(StdRng::from_entropy(), board_size)
    }

    pub fn seeded(board_size: f64, seed: u64) -> RandomSpawner<StdRng> {
        RandomSpawner::new(StdRng::seed_from_u64(seed), board_size)
    }
}

impl<R: Rng> RandomSpawner<R> {
    pub fn new(rng: R, board_size: f64) -> RandomSpawner<R> {
        RandomSpawner {
            rng,
            board_size: board_size.max((TARGET_MARGIN + 1) as f64) as u32,
        }
    }

    fn coordinate(&mut self, margin: u32) -> f64 {
        self.rng.gen_range(0..self.board_size - margin) as f64
    }
}

impl<R: Rng> Spawner for RandomSpawner<R> {
    fn obstacle(&mut self) -> Point {
        let x = self.coordinate(OBSTACLE_MARGIN);
        let y = self.coordinate(OBSTACLE_MARGIN);
        Point::obstacle(x, y)
    }

    fn target(&mut self) -> Point {
        let x = self.coordinate(TARGET_MARGIN);
        let y = self.coordinate(TARGET_MARGIN);
        let number = self.rng.gen_range(MIN_TARGET_VALUE..=MAX_TARGET_VALUE);
        Point::target(x, y, number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entities_stay_on_the_board() {
        let mut spawner = RandomSpawner::seeded(100.0, 7);
        for _ in 0..500 {
            let obstacle = spawner.obstacle();
            assert!((0.0..95.0).contains(&obstacle.x) && (0.0..95.0).contains(&obstacle.y));
            assert_eq!(obstacle.x.fract(), 0.0);

            let target = spawner.target();
            assert!((0.0..90.0).contains(&target.x) && (0.0..90.0).contains(&target.y));
            assert!((1..=10).contains(&target.number));
        }
    }

    #[test]
    fn same_seed_same_entities() {
        let mut a = RandomSpawner::seeded(100.0, 42);
        let mut b = RandomSpawner::seeded(100.0, 42);
        assert_eq!(a.target(), b.target());
        assert_eq!(a.obstacle(), b.obstacle());
    }
}
