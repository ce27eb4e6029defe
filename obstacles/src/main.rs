use std::time::Instant;

use anyhow::Context;
use drone_ipc::detection::drone_xy;
use drone_ipc::entity_stream::EntityPublisher;
use drone_ipc::handoff::OBSTACLES_CHANNEL;
use drone_ipc::mailbox::{Mailbox, MailboxEvent, MailboxNames};
use drone_ipc::point::NUM_OBSTACLES;
use drone_ipc::role::Role;
use drone_ipc::role_log::Stamp;
use drone_ipc::spawner::RandomSpawner;
use drone_ipc::worker::{exit_with, Worker};
use field::ObstacleField;

mod field;

#[tokio::main]
async fn main() {
    exit_with(Role::Obstacles, run().await)
}

async fn run() -> anyhow::Result<()> {
    let mut worker = Worker::start(Role::Obstacles, Stamp::Long)?;
    let config = worker.config.clone();

    let mut publisher = EntityPublisher::new(worker.handoff.take(OBSTACLES_CHANNEL)?, NUM_OBSTACLES)?;
    let mailbox = Mailbox::open(&MailboxNames::from_config(&config)).context("could not open mailbox")?;

    let spawner = RandomSpawner::from_entropy(config.board_size);
    let mut field = ObstacleField::new(spawner, config.obstacle_regen(), Instant::now());
    let mut interval = tokio::time::interval(config.loop_period());

    loop {
        tokio::select! {
            biased;
            signal = worker.termination.recv() => {
                worker.log.line(format!("Received {signal}, stopping"));
                break;
            }
            _ = interval.tick() => {
                if field.regenerate_if_due(Instant::now()) {
                    worker.log.line("Obstacles regenerated");
                }
                publisher.publish(field.points()).await?;
                for (i, obstacle) in field.points().iter().enumerate() {
                    worker.log.line(format!("Obstacle {i}: {:.0}, {:.0}", obstacle.x, obstacle.y));
                }

                let (x, y) = drone_xy(&mailbox.read_position()?);
                if let Some(i) = field.check_collision(x, y, config.detection_radius) {
                    let seq = mailbox.post_event(MailboxEvent::Collision)?;
                    worker.log.line(format!("Drone hit obstacle {i} at {x:.2}, {y:.2} (collision #{seq})"));
                }
            }
        }
    }
    Ok(())
}
