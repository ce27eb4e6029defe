use std::process::ExitStatus;
use std::time::Duration;

use anyhow::anyhow;
use drone_ipc::role::Role;
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub enum Exit {
    Exited(ExitStatus),
    Killed,
    Failed(anyhow::Error),
}

/// Waits on one child in the background so it is reaped the moment it
/// exits. Dropping the reaper kills the child.
pub struct Reaper {
    role: Role,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Exit>,
}

impl Reaper {
    pub fn spawn(role: Role, mut child: Child) -> Reaper {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => {
                        println!("launcher: {role} exited with {status}");
                        Exit::Exited(status)
                    }
                    Err(e) => Exit::Failed(anyhow!("could not wait for {role}: {e}")),
                },
                _ = stop_rx => match child.kill().await {
                    Ok(()) => Exit::Killed,
                    Err(e) => Exit::Failed(anyhow!("could not kill {role}: {e}")),
                },
            }
        });
        Reaper {
            role,
            stop: Some(stop_tx),
            handle,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Gives the child `timeout` to exit on its own, then kills it.
    pub async fn finish(mut self, timeout: Duration) -> Exit {
        if let Ok(exit) = tokio::time::timeout(timeout, &mut self.handle).await {
            return joined(self.role, exit);
        }
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        joined(self.role, (&mut self.handle).await)
    }
}

fn joined(role: Role, result: Result<Exit, tokio::task::JoinError>) -> Exit {
    result.unwrap_or_else(|e| Exit::Failed(anyhow!("reaper for {role} panicked: {e}")))
}

#[cfg(test)]
mod tests {
    use drone_ipc::heartbeat::{PosixSignaller, Signaller};
    use drone_ipc::Pid;
    use tokio::process::Command;
    use tokio::time::Instant;

    use super::*;

    #[tokio::test]
    async fn exited_child_is_reaped_without_being_asked() {
        let child = Command::new("true").spawn().unwrap();
        let pid = Pid(child.id().unwrap() as i32);
        let reaper = Reaper::spawn(Role::Server, child);

        // the watchdog polls like this after its cascade
        let deadline = Instant::now() + Duration::from_secs(2);
        while PosixSignaller.is_alive(pid) && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!PosixSignaller.is_alive(pid));

        match reaper.finish(Duration::from_secs(2)).await {
            Exit::Exited(status) => assert!(status.success()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn straggler_is_killed_after_the_timeout() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let reaper = Reaper::spawn(Role::Targets, child);
        assert_eq!(reaper.role(), Role::Targets);

        let started = Instant::now();
        assert!(matches!(reaper.finish(Duration::from_millis(100)).await, Exit::Killed));
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
