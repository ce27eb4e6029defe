use drone_ipc::mailbox::{EventCounters, EventTracker, MailboxEvent};

pub const COLLISION_PENALTY: i32 = 2;

/// Running score fed from the mailbox event slots.
pub struct Scoreboard {
    tracker: EventTracker,
    total: i32,
}

impl Scoreboard {
    pub fn new(start: EventCounters) -> Scoreboard {
        Scoreboard {
            tracker: EventTracker::new(start),
            total: 0,
        }
    }

    pub fn total(&self) -> i32 {
        self.total
    }

    pub fn apply(&mut self, counters: EventCounters) -> Vec<MailboxEvent> {
        let events = self.tracker.observe(counters);
        for event in &events {
            match event {
                MailboxEvent::Collision => self.total -= COLLISION_PENALTY,
                MailboxEvent::TargetConsumed(value) => self.total += value,
            }
        }
        events
    }
}
