//! Whole-collection snapshots of positioned entities over a one-way pipe.
//!
//! A snapshot is `count * Point::SIZE` bytes, well under `PIPE_BUF`, so a
//! single write lands in the pipe in one piece or not at all.

use std::os::fd::OwnedFd;

use anyhow::{bail, Context};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::pipe;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::point::Point;

pub fn snapshot_size(count: usize) -> usize {
    count * Point::SIZE
}

pub fn encode_snapshot(points: &[Point]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(snapshot_size(points.len()));
    for point in points {
        // writing into a Vec cannot fail
        let _ = point.pack(&mut bytes);
    }
    bytes
}

pub fn decode_snapshot(bytes: &[u8], count: usize) -> anyhow::Result<Vec<Point>> {
    if bytes.len() != snapshot_size(count) {
        bail!("snapshot is {} bytes, expected {}", bytes.len(), snapshot_size(count));
    }
    let mut rdr = bytes;
    (0..count).map(|_| Point::decode(&mut rdr)).collect()
}

pub struct EntityPublisher {
    sender: pipe::Sender,
    count: usize,
}

impl EntityPublisher {
    pub fn new(channel: OwnedFd, count: usize) -> anyhow::Result<EntityPublisher> {
        let sender = pipe::Sender::from_owned_fd(channel).context("entity stream write end is not a pipe")?;
        Ok(EntityPublisher { sender, count })
    }

    /// One write of the entire collection. A short write leaves the stream
    /// unusable and is returned as an error.
    pub async fn publish(&mut self, points: &[Point]) -> anyhow::Result<()> {
        if points.len() != self.count {
            bail!("refusing to publish {} entities on a stream of {}", points.len(), self.count);
        }
        let bytes = encode_snapshot(points);
        let written = self.sender.write(&bytes).await.context("entity stream write failed")?;
        if written != bytes.len() {
            bail!("short write on entity stream: {written} of {} bytes", bytes.len());
        }
        Ok(())
    }
}

pub struct EntityConsumer {
    receiver: pipe::Receiver,
    count: usize,
    buffer: Vec<u8>,
}

impl EntityConsumer {
    pub fn new(channel: OwnedFd, count: usize) -> anyhow::Result<EntityConsumer> {
        let receiver = pipe::Receiver::from_owned_fd(channel).context("entity stream read end is not a pipe")?;
        Ok(EntityConsumer {
            receiver,
            count,
            buffer: vec![0; snapshot_size(count)],
        })
    }

    /// Waits for the next complete snapshot. End of stream, even halfway
    /// through a snapshot, is an error.
    pub async fn consume(&mut self) -> anyhow::Result<Vec<Point>> {
        self.receiver
            .read_exact(&mut self.buffer)
            .await
            .context("entity stream closed or failed")?;
        decode_snapshot(&self.buffer, self.count)
    }
}

/// Keeps the latest complete snapshot in a watch channel so the reader of
/// the channel never waits on the producer. The task ends with the stream's
/// error; the last good snapshot stays in the channel.
pub fn spawn_entity_stream_reader(
    mut consumer: EntityConsumer,
    initial: Vec<Point>,
) -> (watch::Receiver<Vec<Point>>, JoinHandle<anyhow::Result<()>>) {
    let (snapshot_tx, snapshot_rx) = watch::channel(initial);
    let handle = tokio::spawn(async move {
        loop {
            let snapshot = consumer.consume().await?;
            if snapshot_tx.send(snapshot).is_err() {
                return Ok(());
            }
        }
    });
    (snapshot_rx, handle)
}
