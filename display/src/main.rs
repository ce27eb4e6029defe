use anyhow::{anyhow, Context};
use console_input::console_input_thread;
use drone_ipc::detection::drone_xy;
use drone_ipc::entity_stream::{spawn_entity_stream_reader, EntityConsumer};
use drone_ipc::handoff::{KEYS_CHANNEL, OBSTACLES_CHANNEL, TARGETS_CHANNEL};
use drone_ipc::mailbox::{Mailbox, MailboxEvent, MailboxNames};
use drone_ipc::point::{NUM_OBSTACLES, NUM_TARGETS};
use drone_ipc::role::Role;
use drone_ipc::role_log::Stamp;
use drone_ipc::worker::{exit_with, Worker};
use scoreboard::Scoreboard;
use surface::{ConsoleSurface, Frame, Surface};
use tokio::io::AsyncWriteExt;
use tokio::net::unix::pipe;
use tokio::task::JoinError;

mod console_input;
mod scoreboard;
mod surface;

const QUIT_KEY: i32 = 'q' as i32;

#[tokio::main]
async fn main() {
    exit_with(Role::Display, run().await)
}

fn stream_ended(name: &str, result: Result<anyhow::Result<()>, JoinError>) -> anyhow::Error {
    match result {
        Ok(Ok(())) => anyhow!("{name} stream reader stopped"),
        Ok(Err(e)) => e.context(format!("{name} stream failed")),
        Err(e) => anyhow!("{name} stream reader panicked: {e}"),
    }
}

async fn run() -> anyhow::Result<()> {
    let mut worker = Worker::start(Role::Display, Stamp::Short)?;

    let mut keys = pipe::Sender::from_owned_fd(worker.handoff.take(KEYS_CHANNEL)?).context("key channel is not a pipe")?;
    let obstacles = EntityConsumer::new(worker.handoff.take(OBSTACLES_CHANNEL)?, NUM_OBSTACLES)?;
    let targets = EntityConsumer::new(worker.handoff.take(TARGETS_CHANNEL)?, NUM_TARGETS)?;
    let mailbox = Mailbox::open(&MailboxNames::from_config(&worker.config)).context("could not open mailbox")?;

    let (obstacles_rx, mut obstacles_task) = spawn_entity_stream_reader(obstacles, Vec::new());
    let (targets_rx, mut targets_task) = spawn_entity_stream_reader(targets, Vec::new());
    let mut console_keys = console_input_thread();

    let mut surface = ConsoleSurface;
    let mut scoreboard = Scoreboard::new(mailbox.read_events()?);
    let mut interval = tokio::time::interval(worker.config.display_period());

    loop {
        tokio::select! {
            biased;
            signal = worker.termination.recv() => {
                worker.log.line(format!("Received {signal}, closing display"));
                break;
            }
            result = &mut obstacles_task => return Err(stream_ended("obstacles", result)),
            result = &mut targets_task => return Err(stream_ended("targets", result)),
            Some(key) = console_keys.recv() => {
                keys.write_i32_le(key).await.context("could not forward key to input")?;
                if key == QUIT_KEY {
                    worker.log.line("Quit requested");
                    break;
                }
            }
            _ = interval.tick() => {
                let state = mailbox.read_position()?;
                for event in scoreboard.apply(mailbox.read_events()?) {
                    match event {
                        MailboxEvent::Collision => worker.log.line("Obstacle hit"),
                        MailboxEvent::TargetConsumed(value) => worker.log.line(format!("Target consumed, value {value}")),
                    }
                }

                // whatever the producers last delivered, even if that was a while ago
                let frame = Frame {
                    drone: drone_xy(&state),
                    obstacles: obstacles_rx.borrow().clone(),
                    targets: targets_rx.borrow().clone(),
                    score: scoreboard.total(),
                };
                surface.render(&frame);
                worker.log.line(format!(
                    "Drone Position: {:.2}, {:.2} | Score: {}",
                    frame.drone.0, frame.drone.1, frame.score
                ));
            }
        }
    }
    Ok(())
}
