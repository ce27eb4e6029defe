pub mod config;
pub mod detection;
pub mod entity_stream;
pub mod handoff;
pub mod heartbeat;
pub mod mailbox;
pub mod pipe;
pub mod point;
pub mod registration;
pub mod role;
pub mod role_log;
pub mod shutdown;
pub mod spawner;
pub mod worker;

use std::fmt;

/// Process identity as handed around between roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Pid(pub i32);

impl Pid {
    pub fn current() -> Pid {
        Pid(std::process::id() as i32)
    }

    pub fn as_raw(self) -> libc::pid_t {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
