use anyhow::Context;

use crate::config::SimConfig;
use crate::handoff::Handoff;
use crate::heartbeat::install_pong_responder;
use crate::registration::register_self;
use crate::role::Role;
use crate::role_log::{RoleLog, Stamp};
use crate::shutdown::Termination;
use crate::Pid;

/// What every managed role holds after startup. The registration channel is
/// already consumed and closed.
pub struct Worker {
    pub role: Role,
    pub handoff: Handoff,
    pub config: SimConfig,
    pub log: RoleLog,
    pub termination: Termination,
}

impl Worker {
    /// Parses the handoff, answers heartbeats from here on and registers with
    /// the watchdog. Must run inside the tokio runtime.
    pub fn start(role: Role, stamp: Stamp) -> anyhow::Result<Worker> {
        let mut handoff = Handoff::from_args()?;
        let config = handoff.config.clone();

        install_pong_responder().context("could not install heartbeat responder")?;
        let termination = Termination::install().context("could not install termination handler")?;

        let registration = handoff.take_registration(role)?;
        register_self(registration).with_context(|| format!("{role} could not register"))?;
        println!("{role}: {}", Pid::current());

        let log = RoleLog::for_role(&config.log_dir, role, stamp)?;
        Ok(Worker {
            role,
            handoff,
            config,
            log,
            termination,
        })
    }
}

/// Shared tail of every role's `main`: report and pick the exit code.
pub fn exit_with(role: Role, result: anyhow::Result<()>) -> ! {
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            println!("{role}: {e:#}");
            std::process::exit(1);
        }
    }
}
