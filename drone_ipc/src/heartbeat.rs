//! Signal based liveness ping/pong.
//!
//! Handlers here only call async-signal-safe functions (`kill`) or touch
//! atomics. All logging and decisions happen in the main loops.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::Pid;

pub const PING: libc::c_int = libc::SIGUSR1;
pub const PONG: libc::c_int = libc::SIGUSR2;
pub const TERMINATE: libc::c_int = libc::SIGINT;

/// Upper bound on identities the pong listener can watch.
pub const MAX_WATCHED: usize = 8;

#[allow(clippy::declare_interior_mutable_const)]
const NO_PID: AtomicI32 = AtomicI32::new(0);
#[allow(clippy::declare_interior_mutable_const)]
const NOT_SEEN: AtomicBool = AtomicBool::new(false);

static WATCHED: [AtomicI32; MAX_WATCHED] = [NO_PID; MAX_WATCHED];
static REPLIED: [AtomicBool; MAX_WATCHED] = [NOT_SEEN; MAX_WATCHED];

/// Sends heartbeat and termination signals. Split out so the supervisor can
/// be driven without real processes.
pub trait Signaller {
    fn ping(&mut self, pid: Pid) -> io::Result<()>;
    fn terminate(&mut self, pid: Pid) -> io::Result<()>;
    fn is_alive(&mut self, pid: Pid) -> bool;
}

/// Source of heartbeat replies observed since the last drain.
pub trait PongSource {
    fn drain_pongs(&mut self) -> Vec<Pid>;
}

pub struct PosixSignaller;

impl PosixSignaller {
    fn send(pid: Pid, signal: libc::c_int) -> io::Result<()> {
        if unsafe { libc::kill(pid.as_raw(), signal) } == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Signaller for PosixSignaller {
    fn ping(&mut self, pid: Pid) -> io::Result<()> {
        Self::send(pid, PING)
    }

    fn terminate(&mut self, pid: Pid) -> io::Result<()> {
        Self::send(pid, TERMINATE)
    }

    fn is_alive(&mut self, pid: Pid) -> bool {
        if unsafe { libc::kill(pid.as_raw(), 0) } == -1 {
            return io::Error::last_os_error().raw_os_error() == Some(libc::EPERM);
        }
        !is_zombie(pid)
    }
}

/// Exited but not yet waited for by its parent. `kill(pid, 0)` still
/// succeeds for such a process.
fn is_zombie(pid: Pid) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // the command name may contain spaces and parens; the state follows the last ')'
    match stat.rsplit_once(')') {
        Some((_, rest)) => rest.trim_start().starts_with('Z'),
        None => false,
    }
}

fn install_siginfo_handler(
    signal: libc::c_int,
    handler: extern "C" fn(libc::c_int, *mut libc::siginfo_t, *mut libc::c_void),
) -> io::Result<()> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = handler as usize;
        action.sa_flags = libc::SA_SIGINFO | libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(signal, &action, std::ptr::null_mut()) == -1 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

extern "C" fn answer_ping(_signal: libc::c_int, info: *mut libc::siginfo_t, _context: *mut libc::c_void) {
    if info.is_null() {
        return;
    }
    let sender = unsafe { (*info).si_pid() };
    if sender > 0 {
        unsafe { libc::kill(sender, PONG) };
    }
}

/// Every managed role installs this before it registers, otherwise the
/// first ping would hit the default action and kill it.
pub fn install_pong_responder() -> io::Result<()> {
    install_siginfo_handler(PING, answer_ping)
}

extern "C" fn record_pong(_signal: libc::c_int, info: *mut libc::siginfo_t, _context: *mut libc::c_void) {
    if info.is_null() {
        return;
    }
    let sender = unsafe { (*info).si_pid() };
    for (slot, watched) in WATCHED.iter().enumerate() {
        if sender > 0 && watched.load(Ordering::Relaxed) == sender {
            REPLIED[slot].store(true, Ordering::Release);
            return;
        }
    }
}

/// Watchdog side: replies from watched identities are marked here by the
/// handler and collected by the main loop.
pub struct PongBoard {
    watched: usize,
}

impl PongBoard {
    pub fn install(pids: &[Pid]) -> io::Result<PongBoard> {
        if pids.len() > MAX_WATCHED {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("can watch at most {MAX_WATCHED} identities, got {}", pids.len()),
            ));
        }
        for (slot, watched) in WATCHED.iter().enumerate() {
            let pid = pids.get(slot).map(|p| p.as_raw()).unwrap_or(0);
            watched.store(pid, Ordering::Relaxed);
            REPLIED[slot].store(false, Ordering::Relaxed);
        }
        install_siginfo_handler(PONG, record_pong)?;
        Ok(PongBoard { watched: pids.len() })
    }
}

impl PongSource for PongBoard {
    fn drain_pongs(&mut self) -> Vec<Pid> {
        let mut replied = Vec::new();
        for slot in 0..self.watched {
            if REPLIED[slot].swap(false, Ordering::Acquire) {
                replied.push(Pid(WATCHED[slot].load(Ordering::Relaxed)));
            }
        }
        replied
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    #[test]
    fn ping_to_self_comes_back_as_pong() {
        let me = Pid::current();
        let mut board = PongBoard::install(&[me]).unwrap();
        install_pong_responder().unwrap();
        assert!(board.drain_pongs().is_empty());

        PosixSignaller.ping(me).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        let mut replied = Vec::new();
        while replied.is_empty() && Instant::now() < deadline {
            replied = board.drain_pongs();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(replied, vec![me]);
        // drained replies do not come back
        assert!(board.drain_pongs().is_empty());
    }

    #[test]
    fn too_many_identities_are_refused() {
        let pids: Vec<Pid> = (1..=MAX_WATCHED as i32 + 1).map(Pid).collect();
        assert!(PongBoard::install(&pids).is_err());
    }

    #[test]
    fn own_process_is_alive() {
        assert!(PosixSignaller.is_alive(Pid::current()));
        assert!(!is_zombie(Pid::current()));
    }

    #[test]
    fn exited_child_not_yet_waited_for_is_gone() {
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let pid = Pid(child.id() as i32);

        let deadline = Instant::now() + Duration::from_secs(2);
        while !is_zombie(pid) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(!PosixSignaller.is_alive(pid));

        child.wait().unwrap();
    }
}
