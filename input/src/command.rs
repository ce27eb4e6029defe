/// Force currently requested by the user, accumulated key by key.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Force {
    pub fx: f64,
    pub fy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Unit direction, scaled by the force step.
    Push(f64, f64),
    Brake,
    Quit,
}

/// Keyboard layout around `d`:
///
/// ```text
/// w e r
/// s d f
/// x c v
/// ```
pub fn key_to_command(key: i32) -> Option<Command> {
    let c = char::from_u32(key as u32)?.to_ascii_lowercase();
    let command = match c {
        'w' => Command::Push(-1.0, -1.0),
        'e' => Command::Push(0.0, -1.0),
        'r' => Command::Push(1.0, -1.0),
        's' => Command::Push(-1.0, 0.0),
        'd' => Command::Brake,
        'f' => Command::Push(1.0, 0.0),
        'x' => Command::Push(-1.0, 1.0),
        'c' => Command::Push(0.0, 1.0),
        'v' => Command::Push(1.0, 1.0),
        'q' => Command::Quit,
        _ => return None,
    };
    Some(command)
}

impl Force {
    pub fn apply(&mut self, command: Command, step: f64) {
        match command {
            Command::Push(dx, dy) => {
                self.fx += dx * step;
                self.fy += dy * step;
            }
            Command::Brake => *self = Force::default(),
            Command::Quit => {}
        }
    }
}
