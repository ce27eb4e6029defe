use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use drone_ipc::config::SimConfig;
use drone_ipc::handoff::Handoff;
use drone_ipc::mailbox::{Mailbox, MailboxNames};
use drone_ipc::pipe::clear_cloexec;
use drone_ipc::role::Role;
use drone_ipc::shutdown::Termination;
use drone_ipc::Pid;
use tokio::process::{Child, Command};
use reaper::{Exit, Reaper};
use wiring::{inherited, Wiring};

mod reaper;
mod wiring;

const MAILBOX_WAIT: Duration = Duration::from_secs(5);
const MAILBOX_POLL: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            println!("launcher: {e:#}");
            std::process::exit(1);
        }
    }
}

fn binary_dir() -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe().context("could not locate launcher binary")?;
    let dir = exe.parent().context("launcher binary has no parent directory")?;
    Ok(dir.to_path_buf())
}

/// Starts `binary` with the handoff as its only argument, optionally inside
/// `wrapper`. Only the handoff's descriptors survive the exec.
fn spawn(bin_dir: &Path, binary: &str, wrapper: &[String], handoff: &Handoff) -> anyhow::Result<Child> {
    let path = bin_dir.join(binary);
    let mut command = match wrapper.split_first() {
        Some((program, args)) => {
            let mut command = Command::new(program);
            command.args(args).arg(&path);
            command
        }
        None => Command::new(&path),
    };
    command.arg(handoff.encode()?).kill_on_drop(true);

    let fds = inherited(handoff);
    // SAFETY: the closure only calls fcntl, which is async-signal-safe.
    unsafe {
        command.pre_exec(move || {
            for fd in &fds {
                clear_cloexec(*fd)?;
            }
            Ok(())
        });
    }
    command.spawn().with_context(|| format!("could not start {}", path.display()))
}

fn child_pid(child: &Child) -> anyhow::Result<Pid> {
    match child.id() {
        Some(id) => Ok(Pid(id as i32)),
        None => bail!("child exited before its pid was read"),
    }
}

async fn wait_for_mailbox(names: &MailboxNames, server: &mut Child) -> anyhow::Result<()> {
    let deadline = Instant::now() + MAILBOX_WAIT;
    loop {
        if Mailbox::open(names).is_ok() {
            return Ok(());
        }
        if let Some(status) = server.try_wait()? {
            bail!("server exited with {status} before creating the mailbox");
        }
        if Instant::now() >= deadline {
            bail!("mailbox {} did not appear within {MAILBOX_WAIT:?}", names.shm);
        }
        tokio::time::sleep(MAILBOX_POLL).await;
    }
}

fn load_config() -> anyhow::Result<SimConfig> {
    match std::env::args().nth(1) {
        Some(json) => serde_json::from_str(&json).context("malformed configuration argument"),
        None => Ok(SimConfig::default()),
    }
}

async fn run() -> anyhow::Result<i32> {
    let config = load_config()?;
    let bin_dir = binary_dir()?;
    let names = MailboxNames::from_config(&config);
    names.unlink();

    let mut termination = Termination::install().context("could not install termination handler")?;
    let mut wiring = Wiring::create(&config).context("could not create pipes")?;
    let mut children: Vec<Reaper> = Vec::new();

    for role in Role::REGISTERED {
        let handoff = wiring.handoff(role).context("role has no handoff")?;
        let wrapper: &[String] = match role {
            Role::Input => config.input_terminal.as_slice(),
            _ => &[],
        };
        let mut child = spawn(&bin_dir, role.name(), wrapper, handoff)?;
        let pid = child_pid(&child)?;

        if role == Role::Server {
            wait_for_mailbox(&names, &mut child).await?;
        }
        if role == Role::Input && !wrapper.is_empty() {
            println!("launcher: input runs inside {} ({pid})", wrapper[0]);
            wiring.track(Role::InputHost, pid);
        } else {
            println!("launcher: started {role} ({pid})");
        }
        children.push(Reaper::spawn(role, child));
    }

    let mut watchdog = spawn(&bin_dir, "watchdog", &[], wiring.watchdog())?;
    println!("launcher: started watchdog ({})", child_pid(&watchdog)?);

    // registration and data channels now only exist in the children
    let reap_timeout = wiring.config().reap_timeout();
    drop(wiring);

    let status = loop {
        tokio::select! {
            signal = termination.recv() => {
                println!("launcher: {signal} received, waiting for the watchdog");
            }
            status = watchdog.wait() => break status.context("could not wait for watchdog")?,
        }
    };
    println!("launcher: watchdog exited with {status}");

    for reaper in children {
        let role = reaper.role();
        match reaper.finish(reap_timeout).await {
            Exit::Exited(_) => {}
            Exit::Killed => println!("launcher: {role} still running after {reap_timeout:?}, killed it"),
            Exit::Failed(e) => println!("launcher: {e:#}"),
        }
    }
    names.unlink();
    Ok(status.code().unwrap_or(1))
}
