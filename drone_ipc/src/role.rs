use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Server,
    Display,
    Input,
    Dynamics,
    Obstacles,
    Targets,
    InputHost,
}

impl Role {
    /// Round-robin and cascade order.
    pub const ALL: [Role; 7] = [
        Role::Server,
        Role::Display,
        Role::Input,
        Role::Dynamics,
        Role::Obstacles,
        Role::Targets,
        Role::InputHost,
    ];

    /// Roles that register themselves over a pipe and answer heartbeats.
    pub const REGISTERED: [Role; 6] = [
        Role::Server,
        Role::Display,
        Role::Input,
        Role::Dynamics,
        Role::Obstacles,
        Role::Targets,
    ];

    pub fn from_u32(index: u32) -> Option<Role> {
        match index {
            0 => Some(Role::Server),
            1 => Some(Role::Display),
            2 => Some(Role::Input),
            3 => Some(Role::Dynamics),
            4 => Some(Role::Obstacles),
            5 => Some(Role::Targets),
            6 => Some(Role::InputHost),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> u32 {
        match self {
            Role::Server => 0,
            Role::Display => 1,
            Role::Input => 2,
            Role::Dynamics => 3,
            Role::Obstacles => 4,
            Role::Targets => 5,
            Role::InputHost => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Role::Server => "server",
            Role::Display => "display",
            Role::Input => "input",
            Role::Dynamics => "dynamics",
            Role::Obstacles => "obstacles",
            Role::Targets => "targets",
            Role::InputHost => "input_host",
        }
    }

    /// The tracked host of the input role is never pinged, only terminated.
    pub fn answers_heartbeat(&self) -> bool {
        !matches!(self, Role::InputHost)
    }

    /// Name of the registration channel inside a handoff.
    pub fn registration_channel(&self) -> String {
        format!("register_{}", self.name())
    }

    pub fn log_file_name(&self) -> String {
        format!("{}Log.txt", self.name())
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_matches_order() {
        for (i, role) in Role::ALL.iter().enumerate() {
            assert_eq!(role.as_u32(), i as u32);
            assert_eq!(Role::from_u32(i as u32), Some(*role));
        }
        assert_eq!(Role::from_u32(7), None);
    }

    #[test]
    fn only_input_host_skips_heartbeat() {
        let silent: Vec<Role> = Role::ALL.into_iter().filter(|r| !r.answers_heartbeat()).collect();
        assert_eq!(silent, vec![Role::InputHost]);
        assert!(Role::REGISTERED.iter().all(|r| r.answers_heartbeat()));
    }
}
