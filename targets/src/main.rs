use anyhow::Context;
use drone_ipc::detection::drone_xy;
use drone_ipc::entity_stream::EntityPublisher;
use drone_ipc::handoff::TARGETS_CHANNEL;
use drone_ipc::mailbox::{Mailbox, MailboxEvent, MailboxNames};
use drone_ipc::point::NUM_TARGETS;
use drone_ipc::role::Role;
use drone_ipc::role_log::Stamp;
use drone_ipc::spawner::RandomSpawner;
use drone_ipc::worker::{exit_with, Worker};
use target_set::TargetSet;

mod target_set;

#[tokio::main]
async fn main() {
    exit_with(Role::Targets, run().await)
}

async fn run() -> anyhow::Result<()> {
    let mut worker = Worker::start(Role::Targets, Stamp::Long)?;
    let config = worker.config.clone();

    let mut publisher = EntityPublisher::new(worker.handoff.take(TARGETS_CHANNEL)?, NUM_TARGETS)?;
    let mailbox = Mailbox::open(&MailboxNames::from_config(&config)).context("could not open mailbox")?;

    let mut targets = TargetSet::new(RandomSpawner::from_entropy(config.board_size));
    for (i, target) in targets.points().iter().enumerate() {
        worker.log.line(format!("Target {i}: {:.0}, {:.0} worth {}", target.x, target.y, target.number));
    }
    let mut interval = tokio::time::interval(config.loop_period());

    loop {
        tokio::select! {
            biased;
            signal = worker.termination.recv() => {
                worker.log.line(format!("Received {signal}, stopping"));
                break;
            }
            _ = interval.tick() => {
                publisher.publish(targets.points()).await?;

                let (x, y) = drone_xy(&mailbox.read_position()?);
                if let Some(consumed) = targets.consume_near(x, y, config.detection_radius) {
                    publisher.publish(targets.points()).await?;
                    mailbox.post_event(MailboxEvent::TargetConsumed(consumed.number))?;

                    let fresh = targets.points()[NUM_TARGETS - 1];
                    worker.log.line(format!(
                        "Target worth {} reached at {x:.2}, {y:.2}; new target {:.0}, {:.0} worth {}",
                        consumed.number, fresh.x, fresh.y, fresh.number
                    ));
                }
            }
        }
    }
    Ok(())
}
