use drone_ipc::mailbox::STATE_LEN;

/// Point mass with viscous damping, integrated with a second order backward
/// difference. Positions are kept on the board.
#[derive(Debug, Clone, PartialEq)]
pub struct Drone {
    /// `[x_{k-2}, y_{k-2}, x_{k-1}, y_{k-1}, x_k, y_k]`
    state: [f64; STATE_LEN],
    mass: f64,
    damping: f64,
    time_step: f64,
    board_size: f64,
}

impl Drone {
    pub fn at_rest(x: f64, y: f64, mass: f64, damping: f64, time_step: f64, board_size: f64) -> Drone {
        Drone {
            state: [x, y, x, y, x, y],
            mass,
            damping,
            time_step,
            board_size,
        }
    }

    pub fn state(&self) -> &[f64; STATE_LEN] {
        &self.state
    }

    pub fn position(&self) -> (f64, f64) {
        (self.state[4], self.state[5])
    }

    fn next_coordinate(&self, force: f64, before_last: f64, last: f64) -> f64 {
        let (m, k, t) = (self.mass, self.damping, self.time_step);
        let next = (force * t * t - m * before_last + (2.0 * m + k * t) * last) / (m + k * t);
        next.clamp(0.0, self.board_size)
    }

    pub fn step(&mut self, fx: f64, fy: f64) {
        let [_, _, x1, y1, x, y] = self.state;
        let next_x = self.next_coordinate(fx, x1, x);
        let next_y = self.next_coordinate(fy, y1, y);
        self.state = [x1, y1, x, y, next_x, next_y];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drone() -> Drone {
        Drone::at_rest(50.0, 50.0, 1.0, 1.0, 0.5, 100.0)
    }

    #[test]
    fn no_force_stays_put() {
        let mut drone = drone();
        for _ in 0..20 {
            drone.step(0.0, 0.0);
        }
        assert_eq!(drone.position(), (50.0, 50.0));
    }

    #[test]
    fn force_accelerates_along_its_axis() {
        let mut drone = drone();
        drone.step(4.0, 0.0);
        // (4 * 0.25 - 50 + 2.5 * 50) / 1.5
        assert!((drone.position().0 - 50.0 - 1.0 / 1.5).abs() < 1e-9);
        assert_eq!(drone.position().1, 50.0);

        let first = drone.position().0;
        drone.step(4.0, 0.0);
        assert!(drone.position().0 - first > first - 50.0);
        assert_eq!(drone.state()[2], first);
    }

    #[test]
    fn damping_slows_a_coasting_drone() {
        let mut drone = drone();
        drone.step(10.0, 0.0);
        let mut last_speed = f64::MAX;
        for _ in 0..10 {
            let before = drone.position().0;
            drone.step(0.0, 0.0);
            let speed = drone.position().0 - before;
            assert!(speed < last_speed);
            last_speed = speed;
        }
    }

    #[test]
    fn position_is_clamped_to_the_board() {
        let mut drone = drone();
        for _ in 0..200 {
            drone.step(-1000.0, 1000.0);
        }
        assert_eq!(drone.position(), (0.0, 100.0));
    }
}
