use drone_ipc::point::Point;

/// Everything one rendered frame needs.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub drone: (f64, f64),
    pub obstacles: Vec<Point>,
    pub targets: Vec<Point>,
    pub score: i32,
}

pub trait Surface {
    fn render(&mut self, frame: &Frame);
}

/// Prints a one-line summary per frame.
pub struct ConsoleSurface;

impl Surface for ConsoleSurface {
    fn render(&mut self, frame: &Frame) {
        println!("{}", describe(frame));
    }
}

pub fn describe(frame: &Frame) -> String {
    let obstacles = frame
        .obstacles
        .iter()
        .map(|p| format!("#({:.0},{:.0})", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ");
    let targets = frame
        .targets
        .iter()
        .map(|p| format!("{}({:.0},{:.0})", p.number, p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        "drone +({:.2},{:.2}) | score {} | obstacles {obstacles} | targets {targets}",
        frame.drone.0, frame.drone.1, frame.score
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_entity() {
        let frame = Frame {
            drone: (50.0, 50.5),
            obstacles: vec![Point::obstacle(3.0, 4.0)],
            targets: vec![Point::target(10.0, 20.0, 7), Point::target(1.0, 2.0, 1)],
            score: -2,
        };
        assert_eq!(
            describe(&frame),
            "drone +(50.00,50.50) | score -2 | obstacles #(3,4) | targets 7(10,20) 1(1,2)"
        );
    }
}
