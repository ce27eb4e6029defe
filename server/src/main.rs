use anyhow::Context;
use drone_ipc::detection::drone_xy;
use drone_ipc::mailbox::{EventTracker, Mailbox, MailboxEvent, MailboxNames};
use drone_ipc::role::Role;
use drone_ipc::role_log::Stamp;
use drone_ipc::worker::{exit_with, Worker};

#[tokio::main]
async fn main() {
    exit_with(Role::Server, run().await)
}

async fn run() -> anyhow::Result<()> {
    let mut worker = Worker::start(Role::Server, Stamp::Short)?;

    // everyone else opens what is created here; dropping it unlinks
    let mailbox = Mailbox::create(&MailboxNames::from_config(&worker.config)).context("could not create mailbox")?;
    worker.log.line(format!("Mailbox {} created", mailbox.names().shm));

    let mut tracker = EventTracker::new(mailbox.read_events()?);
    let mut interval = tokio::time::interval(worker.config.loop_period());

    loop {
        tokio::select! {
            biased;
            signal = worker.termination.recv() => {
                worker.log.line(format!("Received {signal}, removing mailbox"));
                break;
            }
            _ = interval.tick() => {
                let state = mailbox.read_position()?;
                let (x, y) = drone_xy(&state);
                worker.log.line(format!("Drone Position: {x:.2}, {y:.2}"));

                for event in tracker.observe(mailbox.read_events()?) {
                    match event {
                        MailboxEvent::Collision => worker.log.line("Obstacle hit!"),
                        MailboxEvent::TargetConsumed(value) => worker.log.line(format!("Target hit with value: {value}")),
                    }
                }
            }
        }
    }

    drop(mailbox);
    Ok(())
}
