use std::collections::BTreeMap;
use std::os::fd::{OwnedFd, RawFd};

use drone_ipc::config::SimConfig;
use drone_ipc::handoff::{Handoff, FORCES_CHANNEL, KEYS_CHANNEL, OBSTACLES_CHANNEL, TARGETS_CHANNEL};
use drone_ipc::pipe::{create_pipe, raw};
use drone_ipc::role::Role;

/// Who reads and who writes each data channel.
const DATA_CHANNELS: [(&str, Role, Role); 4] = [
    (KEYS_CHANNEL, Role::Display, Role::Input),
    (FORCES_CHANNEL, Role::Input, Role::Dynamics),
    (OBSTACLES_CHANNEL, Role::Obstacles, Role::Display),
    (TARGETS_CHANNEL, Role::Targets, Role::Display),
];

/// Every pipe of the simulation, with the launcher holding both ends until
/// the children have been spawned. Dropping it closes the launcher's copies.
pub struct Wiring {
    config: SimConfig,
    handoffs: BTreeMap<Role, Handoff>,
    watchdog: Handoff,
    _ends: Vec<OwnedFd>,
}

impl Wiring {
    pub fn create(config: &SimConfig) -> std::io::Result<Wiring> {
        let mut handoffs: BTreeMap<Role, Handoff> =
            Role::REGISTERED.iter().map(|role| (*role, Handoff::new(config.clone()))).collect();
        let mut watchdog = Handoff::new(config.clone());
        let mut ends = Vec::new();

        for (name, writer, reader) in DATA_CHANNELS {
            let (read, write) = create_pipe()?;
            if let Some(handoff) = handoffs.get_mut(&writer) {
                handoff.insert(name, raw(&write));
            }
            if let Some(handoff) = handoffs.get_mut(&reader) {
                handoff.insert(name, raw(&read));
            }
            ends.push(read);
            ends.push(write);
        }

        for role in Role::REGISTERED {
            let (read, write) = create_pipe()?;
            if let Some(handoff) = handoffs.get_mut(&role) {
                handoff.insert(role.registration_channel(), raw(&write));
            }
            watchdog.insert(role.registration_channel(), raw(&read));
            ends.push(read);
            ends.push(write);
        }

        Ok(Wiring {
            config: config.clone(),
            handoffs,
            watchdog,
            _ends: ends,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn handoff(&self, role: Role) -> Option<&Handoff> {
        self.handoffs.get(&role)
    }

    pub fn watchdog(&self) -> &Handoff {
        &self.watchdog
    }

    pub fn track(&mut self, role: Role, pid: drone_ipc::Pid) {
        self.watchdog.tracked.insert(role, pid);
    }
}

/// Descriptors a child must keep across exec.
pub fn inherited(handoff: &Handoff) -> Vec<RawFd> {
    handoff.channels.values().copied().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use drone_ipc::Pid;

    use super::*;

    fn names(handoff: &Handoff) -> BTreeSet<&str> {
        handoff.channels.keys().map(String::as_str).collect()
    }

    #[test]
    fn each_role_gets_only_its_channels() {
        let wiring = Wiring::create(&SimConfig::default()).unwrap();

        let display = wiring.handoff(Role::Display).unwrap();
        assert_eq!(
            names(display),
            BTreeSet::from(["keys", "obstacles", "targets", "register_display"])
        );
        let input = wiring.handoff(Role::Input).unwrap();
        assert_eq!(names(input), BTreeSet::from(["keys", "forces", "register_input"]));
        let server = wiring.handoff(Role::Server).unwrap();
        assert_eq!(names(server), BTreeSet::from(["register_server"]));

        // the two sides of a channel never share a descriptor
        assert_ne!(display.channels["keys"], input.channels["keys"]);
    }

    #[test]
    fn watchdog_holds_every_registration_read_end() {
        let mut wiring = Wiring::create(&SimConfig::default()).unwrap();
        let expected: BTreeSet<String> = Role::REGISTERED.iter().map(|r| r.registration_channel()).collect();
        let held: BTreeSet<String> = wiring.watchdog().channels.keys().cloned().collect();
        assert_eq!(held, expected);

        for role in Role::REGISTERED {
            let channel = role.registration_channel();
            assert_ne!(wiring.watchdog().channels[&channel], wiring.handoff(role).unwrap().channels[&channel]);
        }

        assert!(wiring.watchdog().tracked.is_empty());
        wiring.track(Role::InputHost, Pid(99));
        assert_eq!(wiring.watchdog().tracked[&Role::InputHost], Pid(99));
    }
}
