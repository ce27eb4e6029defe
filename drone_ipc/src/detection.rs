use crate::point::Point;

/// Index of the first point strictly closer than `radius` to `(x, y)`.
pub fn first_within(x: f64, y: f64, points: &[Point], radius: f64) -> Option<usize> {
    points.iter().position(|p| p.distance_to(x, y) < radius)
}

/// Drone coordinates as stored in slots 4 and 5 of the state vector.
pub fn drone_xy(state: &[f64; 6]) -> (f64, f64) {
    (state[4], state[5])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn obstacle_one_unit_away_collides() {
        let obstacles = [Point::obstacle(10.0, 10.0), Point::obstacle(50.0, 51.0)];
        assert_eq!(first_within(50.0, 50.0, &obstacles, 2.0), Some(1));
    }

    #[test]
    fn target_three_units_away_is_not_consumed() {
        let targets = [Point::target(50.0, 53.0, 4)];
        assert_eq!(first_within(50.0, 50.0, &targets, 2.0), None);
    }

    #[test]
    fn distance_equal_to_radius_does_not_count() {
        let targets = [Point::target(52.0, 50.0, 4)];
        assert_eq!(first_within(50.0, 50.0, &targets, 2.0), None);
    }

    #[test]
    fn first_match_wins() {
        let points = [Point::obstacle(0.0, 0.0), Point::obstacle(1.0, 1.0), Point::obstacle(1.5, 1.0)];
        assert_eq!(first_within(1.0, 1.0, &points, 2.0), Some(0));
    }

    #[test]
    fn drone_position_comes_from_last_pair() {
        assert_eq!(drone_xy(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]), (4.0, 5.0));
    }
}
