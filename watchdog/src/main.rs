use anyhow::Context;
use drone_ipc::handoff::Handoff;
use drone_ipc::heartbeat::{PongBoard, PosixSignaller};
use drone_ipc::registration::collect_registrations;
use drone_ipc::role::Role;
use drone_ipc::role_log::{RoleLog, Stamp, WATCHDOG_LOG};
use drone_ipc::shutdown::Termination;
use drone_ipc::Pid;
use process_table::ProcessTable;
use supervisor::{StopReason, Supervisor, SupervisorState};

mod process_table;
mod supervisor;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(reason) => std::process::exit(reason.exit_code()),
        Err(e) => {
            println!("watchdog: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<StopReason> {
    let mut handoff = Handoff::from_args()?;
    let config = handoff.config.clone();
    let mut log = RoleLog::append(&config.log_dir, WATCHDOG_LOG, Stamp::Long)?;
    log.line(format!("Watchdog {} started, state {}", Pid::current(), SupervisorState::AwaitingRegistration));

    // only read ends were inherited, so a role that dies before registering
    // shows up as end of stream instead of blocking forever
    let mut channels = Vec::new();
    for role in Role::REGISTERED {
        channels.push((role, handoff.take_registration(role)?));
    }
    let mut identities = tokio::task::spawn_blocking(move || collect_registrations(channels))
        .await
        .context("registration task panicked")??;

    for (role, pid) in &handoff.tracked {
        if identities.contains_key(role) {
            println!("ignoring tracked identity for {role}, it registered itself");
            continue;
        }
        identities.insert(*role, *pid);
    }
    for (role, pid) in &identities {
        println!("{role}: {pid}");
        log.line(format!("Registered {role} as {pid}"));
    }
    println!("watchdog: {}", Pid::current());

    let table = ProcessTable::new(&identities);
    let pongs = PongBoard::install(&table.monitored_pids()).context("could not install heartbeat listener")?;
    let mut termination = Termination::install().context("could not install termination handler")?;

    let supervisor = Supervisor::new(table, PosixSignaller, pongs, &config, log);
    let reason = supervisor.run(async move { termination.recv().await }).await;
    Ok(reason)
}
