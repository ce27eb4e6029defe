use anyhow::Context;
use command::{key_to_command, Command, Force};
use drone_ipc::handoff::{FORCES_CHANNEL, KEYS_CHANNEL};
use drone_ipc::role::Role;
use drone_ipc::role_log::Stamp;
use drone_ipc::worker::{exit_with, Worker};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::sync::mpsc;

mod command;

#[tokio::main]
async fn main() {
    exit_with(Role::Input, run().await)
}

/// Forwards every key read from the display; ends when the display closes
/// its end. Runs as its own task so a half-read key is never dropped by the
/// main loop's `select!`.
fn spawn_key_reader(mut keys: pipe::Receiver) -> mpsc::Receiver<std::io::Result<i32>> {
    let (key_tx, key_rx) = mpsc::channel(100);
    tokio::spawn(async move {
        loop {
            let key = keys.read_i32_le().await;
            let closed = key.is_err();
            if key_tx.send(key).await.is_err() || closed {
                return;
            }
        }
    });
    key_rx
}

async fn run() -> anyhow::Result<()> {
    let mut worker = Worker::start(Role::Input, Stamp::Long)?;

    let keys = pipe::Receiver::from_owned_fd(worker.handoff.take(KEYS_CHANNEL)?).context("key channel is not a pipe")?;
    let mut forces = pipe::Sender::from_owned_fd(worker.handoff.take(FORCES_CHANNEL)?).context("force channel is not a pipe")?;
    let mut keys = spawn_key_reader(keys);
    let step = worker.config.force_step;
    let mut force = Force::default();

    loop {
        tokio::select! {
            biased;
            signal = worker.termination.recv() => {
                worker.log.line(format!("Received {signal}, stopping"));
                break;
            }
            key = keys.recv() => {
                let key = match key {
                    Some(Ok(key)) => key,
                    Some(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                        worker.log.line("Display closed the key channel");
                        break;
                    }
                    Some(Err(e)) => return Err(e).context("key channel failed"),
                    None => break,
                };
                let Some(command) = key_to_command(key) else { continue };
                if command == Command::Quit {
                    worker.log.line("Quit key received");
                    break;
                }
                force.apply(command, step);
                worker.log.line(format!("Key {key} -> force ({:.2}, {:.2})", force.fx, force.fy));

                forces.write_f64_le(force.fx).await.context("could not send force")?;
                forces.write_f64_le(force.fy).await.context("could not send force")?;
            }
        }
    }
    Ok(())
}
