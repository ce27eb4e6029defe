use std::collections::BTreeMap;

use drone_ipc::{role::Role, Pid};

#[derive(Debug, Clone, PartialEq)]
pub struct ManagedProcess {
    pub role: Role,
    pub pid: Pid,
    pub missed: u32,
}

/// Every tracked role, keyed and iterated in role order.
#[derive(Debug, Default)]
pub struct ProcessTable {
    entries: BTreeMap<Role, ManagedProcess>,
}

impl ProcessTable {
    pub fn new(identities: &BTreeMap<Role, Pid>) -> ProcessTable {
        let entries = identities
            .iter()
            .map(|(role, pid)| (*role, ManagedProcess { role: *role, pid: *pid, missed: 0 }))
            .collect();
        ProcessTable { entries }
    }

    #[cfg(test)]
    pub fn get(&self, role: Role) -> Option<&ManagedProcess> {
        self.entries.get(&role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManagedProcess> {
        self.entries.values()
    }

    /// Processes that are pinged each tick, in round-robin order.
    pub fn monitored(&self) -> impl Iterator<Item = &ManagedProcess> {
        self.entries.values().filter(|p| p.role.answers_heartbeat())
    }

    pub fn monitored_pids(&self) -> Vec<Pid> {
        self.monitored().map(|p| p.pid).collect()
    }

    /// Start of a tick: every monitored process has missed one more reply
    /// until it proves otherwise.
    pub fn begin_tick(&mut self) {
        for process in self.entries.values_mut().filter(|p| p.role.answers_heartbeat()) {
            process.missed += 1;
        }
    }

    /// Resets the miss counter of whoever owns `pid`. Unknown identities are
    /// ignored.
    pub fn record_pong(&mut self, pid: Pid) -> Option<Role> {
        let process = self.entries.values_mut().find(|p| p.pid == pid)?;
        process.missed = 0;
        Some(process.role)
    }

    /// First process, in role order, whose miss counter is above `threshold`.
    pub fn first_over(&self, threshold: u32) -> Option<&ManagedProcess> {
        self.monitored().find(|p| p.missed > threshold)
    }

    pub fn summary(&self) -> String {
        self.monitored()
            .map(|p| format!("{}({})", p.role, p.missed))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ProcessTable {
        let mut identities = BTreeMap::new();
        for (i, role) in Role::ALL.iter().enumerate() {
            identities.insert(*role, Pid(100 + i as i32));
        }
        ProcessTable::new(&identities)
    }

    #[test]
    fn input_host_is_tracked_but_not_monitored() {
        let table = table();
        assert_eq!(table.iter().count(), 7);
        assert_eq!(table.monitored().count(), 6);
        assert!(table.monitored().all(|p| p.role != Role::InputHost));
    }

    #[test]
    fn pong_resets_only_its_sender() {
        let mut table = table();
        table.begin_tick();
        table.begin_tick();
        assert_eq!(table.record_pong(Pid(101)), Some(Role::Display));
        assert_eq!(table.get(Role::Display).unwrap().missed, 0);
        assert_eq!(table.get(Role::Server).unwrap().missed, 2);
        assert_eq!(table.get(Role::InputHost).unwrap().missed, 0);
        assert_eq!(table.record_pong(Pid(9999)), None);
    }

    #[test]
    fn threshold_is_exceeded_not_reached() {
        let mut table = table();
        for _ in 0..6 {
            table.begin_tick();
        }
        assert!(table.first_over(6).is_none());
        table.begin_tick();
        assert_eq!(table.first_over(6).map(|p| p.role), Some(Role::Server));
    }

    #[test]
    fn summary_lists_counters_in_role_order() {
        let mut table = table();
        table.begin_tick();
        table.record_pong(Pid(100));
        assert_eq!(
            table.summary(),
            "server(0), display(1), input(1), dynamics(1), obstacles(1), targets(1)"
        );
    }
}
