//! Shared, semaphore guarded exchange point between roles.
//!
//! One named shared memory object holds three typed slots, one named
//! semaphore guards the whole region. Every access is acquire, copy, release.
//! Within a slot the latest write wins: nothing is queued.
//!
//! ```text
//! offset  0  position      [f64; 6]   written by dynamics
//! offset 48  collision seq  u64       bumped by obstacles
//! offset 56  score seq      u64       bumped by targets
//! offset 64  score value    i32       value of the last consumed target
//! ```

use std::ffi::CString;
use std::io;
use std::ptr;

use anyhow::{bail, Context};
use byteorder::{ByteOrder, LittleEndian};

use crate::config::SimConfig;

pub const STATE_LEN: usize = 6;
pub const POSITION_OFFSET: usize = 0;
pub const COLLISION_SEQ_OFFSET: usize = 48;
pub const SCORE_SEQ_OFFSET: usize = 56;
pub const SCORE_VALUE_OFFSET: usize = 64;
pub const MAILBOX_SIZE: usize = 72;

pub const MIN_TARGET_VALUE: i32 = 1;
pub const MAX_TARGET_VALUE: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxNames {
    pub shm: String,
    pub sem: String,
}

impl MailboxNames {
    pub fn from_config(config: &SimConfig) -> MailboxNames {
        MailboxNames {
            shm: config.shm_name.clone(),
            sem: config.sem_name.clone(),
        }
    }

    fn c_names(&self) -> anyhow::Result<(CString, CString)> {
        let shm = CString::new(self.shm.as_str()).context("shared memory name contains a nul byte")?;
        let sem = CString::new(self.sem.as_str()).context("semaphore name contains a nul byte")?;
        Ok((shm, sem))
    }

    /// Removes both named objects. Missing objects are not an error.
    pub fn unlink(&self) {
        let Ok((shm, sem)) = self.c_names() else { return };
        unsafe {
            libc::shm_unlink(shm.as_ptr());
            libc::sem_unlink(sem.as_ptr());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxEvent {
    Collision,
    TargetConsumed(i32),
}

/// Raw event slots as last seen in the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventCounters {
    pub collision_seq: u64,
    pub score_seq: u64,
    pub score_value: i32,
}

pub struct Mailbox {
    names: MailboxNames,
    region: *mut u8,
    semaphore: *mut libc::sem_t,
    owner: bool,
}

// SAFETY: the region and the semaphore are process-shared objects; all access
// to the region goes through the semaphore.
unsafe impl Send for Mailbox {}
unsafe impl Sync for Mailbox {}

impl Mailbox {
    /// Creates, zero-fills and unlocks the mailbox. Stale objects from an
    /// earlier run are removed first. The creator unlinks on drop.
    pub fn create(names: &MailboxNames) -> anyhow::Result<Mailbox> {
        names.unlink();
        let (shm_name, sem_name) = names.c_names()?;

        let fd = unsafe { libc::shm_open(shm_name.as_ptr(), libc::O_CREAT | libc::O_EXCL | libc::O_RDWR, 0o600 as libc::mode_t) };
        if fd < 0 {
            return Err(io::Error::last_os_error()).with_context(|| format!("shm_open {}", names.shm));
        }
        if unsafe { libc::ftruncate(fd, MAILBOX_SIZE as libc::off_t) } == -1 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            names.unlink();
            return Err(err).context("ftruncate mailbox");
        }
        let region = map_region(fd);
        unsafe { libc::close(fd) };
        let region = match region {
            Ok(region) => region,
            Err(e) => {
                names.unlink();
                return Err(e).context("mmap mailbox");
            }
        };
        unsafe { ptr::write_bytes(region, 0, MAILBOX_SIZE) };

        let semaphore = unsafe {
            libc::sem_open(sem_name.as_ptr(), libc::O_CREAT | libc::O_EXCL, 0o600 as libc::c_uint, 0 as libc::c_uint)
        };
        if semaphore == libc::SEM_FAILED {
            let err = io::Error::last_os_error();
            unsafe { libc::munmap(region as *mut libc::c_void, MAILBOX_SIZE) };
            names.unlink();
            return Err(err).with_context(|| format!("sem_open {}", names.sem));
        }

        let mailbox = Mailbox {
            names: names.clone(),
            region,
            semaphore,
            owner: true,
        };
        // created locked, released once so the first waiter gets through
        mailbox.post()?;
        Ok(mailbox)
    }

    /// Opens a mailbox created by another role. Never creates or initializes.
    pub fn open(names: &MailboxNames) -> anyhow::Result<Mailbox> {
        let (shm_name, sem_name) = names.c_names()?;

        let semaphore = unsafe { libc::sem_open(sem_name.as_ptr(), 0) };
        if semaphore == libc::SEM_FAILED {
            return Err(io::Error::last_os_error()).with_context(|| format!("sem_open {} (mailbox not created yet?)", names.sem));
        }

        let fd = unsafe { libc::shm_open(shm_name.as_ptr(), libc::O_RDWR, 0o600 as libc::mode_t) };
        if fd < 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::sem_close(semaphore) };
            return Err(err).with_context(|| format!("shm_open {} (mailbox not created yet?)", names.shm));
        }
        let size = region_size(fd);
        let region = match size {
            Ok(size) if size >= MAILBOX_SIZE => map_region(fd),
            Ok(size) => Err(io::Error::new(io::ErrorKind::InvalidData, format!("mailbox is {size} bytes, expected {MAILBOX_SIZE}"))),
            Err(e) => Err(e),
        };
        unsafe { libc::close(fd) };
        let region = match region {
            Ok(region) => region,
            Err(e) => {
                unsafe { libc::sem_close(semaphore) };
                return Err(e).context("mmap mailbox");
            }
        };

        Ok(Mailbox {
            names: names.clone(),
            region,
            semaphore,
            owner: false,
        })
    }

    pub fn names(&self) -> &MailboxNames {
        &self.names
    }

    /// Blocks until the caller holds the mailbox. Interrupted waits (the
    /// heartbeat signals land here) are retried.
    pub fn acquire(&self) -> anyhow::Result<MailboxGuard<'_>> {
        loop {
            if unsafe { libc::sem_wait(self.semaphore) } == 0 {
                return Ok(MailboxGuard { mailbox: self });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err).context("sem_wait on mailbox");
            }
        }
    }

    fn post(&self) -> anyhow::Result<()> {
        if unsafe { libc::sem_post(self.semaphore) } == -1 {
            return Err(io::Error::last_os_error()).context("sem_post on mailbox");
        }
        Ok(())
    }

    pub fn write_position(&self, state: &[f64; STATE_LEN]) -> anyhow::Result<()> {
        let mut bytes = [0u8; STATE_LEN * 8];
        LittleEndian::write_f64_into(state, &mut bytes);
        let mut guard = self.acquire()?;
        guard.write_bytes(POSITION_OFFSET, &bytes)
    }

    pub fn read_position(&self) -> anyhow::Result<[f64; STATE_LEN]> {
        let mut bytes = [0u8; STATE_LEN * 8];
        {
            let guard = self.acquire()?;
            guard.read_bytes(POSITION_OFFSET, &mut bytes)?;
        }
        let mut state = [0.0; STATE_LEN];
        LittleEndian::read_f64_into(&bytes, &mut state);
        Ok(state)
    }

    /// Bumps the slot's sequence number and returns the new value.
    pub fn post_event(&self, event: MailboxEvent) -> anyhow::Result<u64> {
        if let MailboxEvent::TargetConsumed(value) = event {
            if !(MIN_TARGET_VALUE..=MAX_TARGET_VALUE).contains(&value) {
                bail!("target value {value} out of range");
            }
        }

        let mut guard = self.acquire()?;
        let seq_offset = match event {
            MailboxEvent::Collision => COLLISION_SEQ_OFFSET,
            MailboxEvent::TargetConsumed(_) => SCORE_SEQ_OFFSET,
        };
        let mut seq_bytes = [0u8; 8];
        guard.read_bytes(seq_offset, &mut seq_bytes)?;
        let seq = LittleEndian::read_u64(&seq_bytes) + 1;
        LittleEndian::write_u64(&mut seq_bytes, seq);

        if let MailboxEvent::TargetConsumed(value) = event {
            let mut value_bytes = [0u8; 4];
            LittleEndian::write_i32(&mut value_bytes, value);
            guard.write_bytes(SCORE_VALUE_OFFSET, &value_bytes)?;
        }
        guard.write_bytes(seq_offset, &seq_bytes)?;
        Ok(seq)
    }

    pub fn read_events(&self) -> anyhow::Result<EventCounters> {
        let mut bytes = [0u8; MAILBOX_SIZE - COLLISION_SEQ_OFFSET];
        {
            let guard = self.acquire()?;
            guard.read_bytes(COLLISION_SEQ_OFFSET, &mut bytes)?;
        }
        let at = |offset: usize| offset - COLLISION_SEQ_OFFSET;
        Ok(EventCounters {
            collision_seq: LittleEndian::read_u64(&bytes[at(COLLISION_SEQ_OFFSET)..]),
            score_seq: LittleEndian::read_u64(&bytes[at(SCORE_SEQ_OFFSET)..]),
            score_value: LittleEndian::read_i32(&bytes[at(SCORE_VALUE_OFFSET)..]),
        })
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.region as *mut libc::c_void, MAILBOX_SIZE);
            libc::sem_close(self.semaphore);
        }
        if self.owner {
            self.names.unlink();
        }
    }
}

/// Exclusive access to the region. Released on drop.
pub struct MailboxGuard<'a> {
    mailbox: &'a Mailbox,
}

impl MailboxGuard<'_> {
    fn check_range(offset: usize, len: usize) -> anyhow::Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= MAILBOX_SIZE => Ok(()),
            _ => bail!("mailbox access {offset}+{len} outside {MAILBOX_SIZE} bytes"),
        }
    }

    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) -> anyhow::Result<()> {
        Self::check_range(offset, out.len())?;
        // SAFETY: range checked against the mapping, semaphore held.
        unsafe { ptr::copy_nonoverlapping(self.mailbox.region.add(offset), out.as_mut_ptr(), out.len()) };
        Ok(())
    }

    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> anyhow::Result<()> {
        Self::check_range(offset, data.len())?;
        // SAFETY: range checked against the mapping, semaphore held.
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), self.mailbox.region.add(offset), data.len()) };
        Ok(())
    }

    pub fn release(self) {}
}

impl Drop for MailboxGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.mailbox.post() {
            println!("error while releasing mailbox: {e:#}");
        }
    }
}

/// Turns successive [`EventCounters`] into events, one per slot that moved.
/// Several posts to the same slot between two observations collapse into one.
#[derive(Debug, Default)]
pub struct EventTracker {
    seen: EventCounters,
}

impl EventTracker {
    pub fn new(start: EventCounters) -> EventTracker {
        EventTracker { seen: start }
    }

    pub fn observe(&mut self, now: EventCounters) -> Vec<MailboxEvent> {
        let mut events = Vec::new();
        if now.collision_seq != self.seen.collision_seq {
            events.push(MailboxEvent::Collision);
        }
        if now.score_seq != self.seen.score_seq {
            events.push(MailboxEvent::TargetConsumed(now.score_value));
        }
        self.seen = now;
        events
    }
}

fn map_region(fd: libc::c_int) -> io::Result<*mut u8> {
    let map = unsafe {
        libc::mmap(
            ptr::null_mut(),
            MAILBOX_SIZE,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if map == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    Ok(map as *mut u8)
}

fn region_size(fd: libc::c_int) -> io::Result<usize> {
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd, &mut stat) } == -1 {
        return Err(io::Error::last_os_error());
    }
    Ok(stat.st_size as usize)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn test_names(tag: &str) -> MailboxNames {
        MailboxNames {
            shm: format!("/drone_ipc_test_{tag}_{}_shm", std::process::id()),
            sem: format!("/drone_ipc_test_{tag}_{}_sem", std::process::id()),
        }
    }

    #[test]
    fn open_before_create_fails() {
        let names = test_names("absent");
        names.unlink();
        assert!(Mailbox::open(&names).is_err());
    }

    #[test]
    fn created_mailbox_is_zeroed_and_unlocked() {
        let names = test_names("zeroed");
        let mailbox = Mailbox::create(&names).unwrap();
        assert_eq!(mailbox.read_position().unwrap(), [0.0; STATE_LEN]);
        assert_eq!(mailbox.read_events().unwrap(), EventCounters::default());
    }

    #[test]
    fn position_round_trips_through_another_mapping() {
        let names = test_names("position");
        let owner = Mailbox::create(&names).unwrap();
        let other = Mailbox::open(&names).unwrap();

        let state = [49.5, 49.75, 49.9, 50.1, 50.25, 50.5];
        other.write_position(&state).unwrap();
        assert_eq!(owner.read_position().unwrap(), state);
    }

    #[test]
    fn owner_drop_unlinks() {
        let names = test_names("unlink");
        let owner = Mailbox::create(&names).unwrap();
        drop(owner);
        assert!(Mailbox::open(&names).is_err());
    }

    #[test]
    fn events_do_not_clobber_position() {
        let names = test_names("slots");
        let mailbox = Mailbox::create(&names).unwrap();
        let state = [1.0, 2.0, 3.0, 4.0, 50.0, 51.0];
        mailbox.write_position(&state).unwrap();

        assert_eq!(mailbox.post_event(MailboxEvent::Collision).unwrap(), 1);
        assert_eq!(mailbox.post_event(MailboxEvent::TargetConsumed(7)).unwrap(), 1);

        assert_eq!(mailbox.read_position().unwrap(), state);
        let events = mailbox.read_events().unwrap();
        assert_eq!(events, EventCounters { collision_seq: 1, score_seq: 1, score_value: 7 });
    }

    #[test]
    fn out_of_range_target_value_is_rejected() {
        let names = test_names("range");
        let mailbox = Mailbox::create(&names).unwrap();
        assert!(mailbox.post_event(MailboxEvent::TargetConsumed(0)).is_err());
        assert!(mailbox.post_event(MailboxEvent::TargetConsumed(11)).is_err());
        assert_eq!(mailbox.read_events().unwrap().score_seq, 0);
    }

    #[test]
    fn guard_rejects_access_past_the_region() {
        let names = test_names("bounds");
        let mailbox = Mailbox::create(&names).unwrap();
        let mut guard = mailbox.acquire().unwrap();
        let mut out = [0u8; 8];
        assert!(guard.read_bytes(MAILBOX_SIZE - 4, &mut out).is_err());
        assert!(guard.write_bytes(usize::MAX, &[1]).is_err());
        assert!(guard.write_bytes(MAILBOX_SIZE - 8, &out).is_ok());
        guard.release();
        // released guard lets the next caller in
        drop(mailbox.acquire().unwrap());
    }

    #[test]
    fn concurrent_callers_never_interleave() {
        let names = test_names("exclusion");
        let mailbox = Arc::new(Mailbox::create(&names).unwrap());

        let workers: Vec<_> = (1..=8u8)
            .map(|id| {
                let mailbox = mailbox.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let mut guard = mailbox.acquire().unwrap();
                        guard.write_bytes(0, &[id; MAILBOX_SIZE]).unwrap();
                        thread::yield_now();
                        let mut seen = [0u8; MAILBOX_SIZE];
                        guard.read_bytes(0, &mut seen).unwrap();
                        assert!(seen.iter().all(|b| *b == id), "caller {id} saw a foreign write");
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }
    }

    #[test]
    fn tracker_reports_each_moved_slot_once() {
        let mut tracker = EventTracker::default();
        assert!(tracker.observe(EventCounters::default()).is_empty());

        let now = EventCounters { collision_seq: 1, score_seq: 0, score_value: 0 };
        assert_eq!(tracker.observe(now), vec![MailboxEvent::Collision]);
        assert!(tracker.observe(now).is_empty());

        // two consumed targets between observations: the latest value wins
        let now = EventCounters { collision_seq: 1, score_seq: 2, score_value: 9 };
        assert_eq!(tracker.observe(now), vec![MailboxEvent::TargetConsumed(9)]);
    }
}
