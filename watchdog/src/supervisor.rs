use std::fmt;
use std::future::Future;
use std::time::Duration;

use drone_ipc::config::SimConfig;
use drone_ipc::heartbeat::{PongSource, Signaller};
use drone_ipc::role::Role;
use drone_ipc::role_log::RoleLog;
use drone_ipc::Pid;
use tokio::time::Instant;

use crate::process_table::ProcessTable;

const REAP_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    AwaitingRegistration,
    Monitoring,
    Terminating,
    Exited,
}

impl fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SupervisorState::AwaitingRegistration => "awaiting registration",
            SupervisorState::Monitoring => "monitoring",
            SupervisorState::Terminating => "terminating",
            SupervisorState::Exited => "exited",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Healthy,
    Unhealthy { role: Role, missed: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Unhealthy(Role),
    External(&'static str),
}

impl StopReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            StopReason::Unhealthy(_) => 1,
            StopReason::External(_) => 0,
        }
    }
}

pub struct Supervisor<S: Signaller, P: PongSource> {
    table: ProcessTable,
    signaller: S,
    pongs: P,
    miss_threshold: u32,
    ping_delay: Duration,
    reap_timeout: Duration,
    log: RoleLog,
    state: SupervisorState,
}

impl<S: Signaller, P: PongSource> Supervisor<S, P> {
    /// Registration has already completed when a supervisor exists.
    pub fn new(table: ProcessTable, signaller: S, pongs: P, config: &SimConfig, log: RoleLog) -> Supervisor<S, P> {
        let mut supervisor = Supervisor {
            table,
            signaller,
            pongs,
            miss_threshold: config.miss_threshold,
            ping_delay: config.ping_delay(),
            reap_timeout: config.reap_timeout(),
            log,
            state: SupervisorState::AwaitingRegistration,
        };
        supervisor.transition(SupervisorState::Monitoring);
        supervisor
    }

    #[cfg(test)]
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    #[cfg(test)]
    pub fn table(&self) -> &ProcessTable {
        &self.table
    }

    fn transition(&mut self, next: SupervisorState) {
        self.log.line(format!("State {} -> {next}", self.state));
        self.state = next;
    }

    fn absorb_pongs(&mut self) {
        for pid in self.pongs.drain_pongs() {
            match self.table.record_pong(pid) {
                Some(role) => self.log.line(format!("Received heartbeat reply from {role} ({pid})")),
                None => self.log.line(format!("Ignoring heartbeat reply from untracked process {pid}")),
            }
        }
    }

    /// One sequential round: bump every counter, ping in role order with a
    /// fixed delay, fold in replies, then check the threshold.
    pub async fn tick(&mut self) -> TickOutcome {
        self.table.begin_tick();

        let round: Vec<(Role, Pid)> = self.table.monitored().map(|p| (p.role, p.pid)).collect();
        for (role, pid) in round {
            if let Err(e) = self.signaller.ping(pid) {
                self.log.line(format!("Could not ping {role} ({pid}): {e}"));
            }
            tokio::time::sleep(self.ping_delay).await;
            self.absorb_pongs();
        }
        self.absorb_pongs();

        self.log.line(format!("Signals sent to processes: {}", self.table.summary()));

        match self.table.first_over(self.miss_threshold) {
            Some(process) => TickOutcome::Unhealthy { role: process.role, missed: process.missed },
            None => TickOutcome::Healthy,
        }
    }

    /// Sends the termination signal to every tracked identity once, in role
    /// order. A failed send is logged and skipped. Returns the failure count.
    pub fn terminate_all(&mut self) -> usize {
        self.transition(SupervisorState::Terminating);

        let mut failed = 0;
        let targets: Vec<(Role, Pid)> = self.table.iter().map(|p| (p.role, p.pid)).collect();
        for (role, pid) in targets {
            match self.signaller.terminate(pid) {
                Ok(()) => self.log.line(format!("Sent termination to {role} ({pid})")),
                Err(e) => {
                    failed += 1;
                    self.log.line(format!("Could not terminate {role} ({pid}): {e}"));
                }
            }
        }
        self.log.line("Watchdog terminated all processes");
        println!("Sent signals to all processes");
        failed
    }

    /// Waits, up to the reap timeout, for every tracked identity to go away.
    /// Returns the roles still alive at the deadline.
    pub async fn reap(&mut self) -> Vec<Role> {
        let deadline = Instant::now() + self.reap_timeout;
        let mut remaining: Vec<(Role, Pid)> = self.table.iter().map(|p| (p.role, p.pid)).collect();
        loop {
            remaining.retain(|(_, pid)| self.signaller.is_alive(*pid));
            if remaining.is_empty() || Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(REAP_POLL).await;
        }
        for (role, pid) in &remaining {
            self.log.line(format!("{role} ({pid}) still alive after {:?}", self.reap_timeout));
        }
        remaining.into_iter().map(|(role, _)| role).collect()
    }

    /// Monitors until a process goes silent past the threshold or `shutdown`
    /// resolves, then cascades termination and waits for the exits.
    pub async fn run(mut self, shutdown: impl Future<Output = &'static str>) -> StopReason {
        tokio::pin!(shutdown);
        let reason = loop {
            tokio::select! {
                biased;
                signal = &mut shutdown => {
                    self.log.line(format!("Received {signal}, shutting down"));
                    break StopReason::External(signal);
                }
                outcome = self.tick() => {
                    if let TickOutcome::Unhealthy { role, missed } = outcome {
                        self.log.line(format!("{role} missed {missed} heartbeats (threshold {})", self.miss_threshold));
                        break StopReason::Unhealthy(role);
                    }
                }
            }
        };

        self.terminate_all();
        if let StopReason::Unhealthy(_) = reason {
            self.log.line("Watchdog terminated due to process counters exceeding the threshold");
        }
        let stragglers = self.reap().await;
        if !stragglers.is_empty() {
            println!("processes still running after shutdown: {stragglers:?}");
        }
        self.transition(SupervisorState::Exited);
        reason
    }
}
