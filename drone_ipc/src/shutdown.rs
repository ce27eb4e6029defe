use tokio::signal::unix::{signal, Signal, SignalKind};

/// SIGINT/SIGTERM delivered to the main loop instead of acted on inside a
/// handler.
pub struct Termination {
    interrupt: Signal,
    terminate: Signal,
}

impl Termination {
    pub fn install() -> std::io::Result<Termination> {
        Ok(Termination {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Resolves with the name of the signal that asked us to stop.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn sigterm_wakes_the_waiter() {
        let mut termination = Termination::install().unwrap();
        unsafe { libc::kill(libc::getpid(), libc::SIGTERM) };
        let name = tokio::time::timeout(Duration::from_secs(2), termination.recv()).await.unwrap();
        assert_eq!(name, "SIGTERM");
    }
}
