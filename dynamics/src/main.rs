use anyhow::Context;
use drone::Drone;
use drone_ipc::handoff::FORCES_CHANNEL;
use drone_ipc::mailbox::{Mailbox, MailboxNames};
use drone_ipc::role::Role;
use drone_ipc::role_log::Stamp;
use drone_ipc::worker::{exit_with, Worker};
use tokio::io::AsyncReadExt;
use tokio::net::unix::pipe;
use tokio::sync::watch;
use tokio::task::JoinHandle;

mod drone;

#[tokio::main]
async fn main() {
    exit_with(Role::Dynamics, run().await)
}

/// Latest commanded force. Input going away leaves the last force applied.
fn spawn_force_reader(mut forces: pipe::Receiver) -> (watch::Receiver<(f64, f64)>, JoinHandle<anyhow::Result<()>>) {
    let (force_tx, force_rx) = watch::channel((0.0, 0.0));
    let handle = tokio::spawn(async move {
        loop {
            let fx = forces.read_f64_le().await.context("force channel closed")?;
            let fy = forces.read_f64_le().await.context("force channel closed")?;
            if force_tx.send((fx, fy)).is_err() {
                return Ok(());
            }
        }
    });
    (force_rx, handle)
}

async fn run() -> anyhow::Result<()> {
    let mut worker = Worker::start(Role::Dynamics, Stamp::Long)?;
    let config = worker.config.clone();

    let forces = pipe::Receiver::from_owned_fd(worker.handoff.take(FORCES_CHANNEL)?).context("force channel is not a pipe")?;
    let mailbox = Mailbox::open(&MailboxNames::from_config(&config)).context("could not open mailbox")?;
    let (mut force_rx, mut force_task) = spawn_force_reader(forces);

    let (x, y) = config.board_center();
    let mut drone = Drone::at_rest(x, y, config.mass, config.damping, config.time_step, config.board_size);
    mailbox.write_position(drone.state())?;

    let mut interval = tokio::time::interval(std::time::Duration::from_secs_f64(config.time_step));
    let mut input_gone = false;

    loop {
        tokio::select! {
            biased;
            signal = worker.termination.recv() => {
                worker.log.line(format!("Received {signal}, stopping"));
                break;
            }
            result = &mut force_task, if !input_gone => {
                input_gone = true;
                match result {
                    Ok(Err(e)) => worker.log.line(format!("{e:#}, holding last force")),
                    Ok(Ok(())) => {}
                    Err(e) => worker.log.line(format!("force reader panicked: {e}")),
                }
            }
            Ok(()) = force_rx.changed() => {
                let (fx, fy) = *force_rx.borrow_and_update();
                worker.log.line(format!("Force set to ({fx:.2}, {fy:.2})"));
            }
            _ = interval.tick() => {
                let (fx, fy) = *force_rx.borrow();
                drone.step(fx, fy);
                mailbox.write_position(drone.state())?;
                let (x, y) = drone.position();
                worker.log.line(format!("Drone Position: {x:.2}, {y:.2}"));
            }
        }
    }
    Ok(())
}
