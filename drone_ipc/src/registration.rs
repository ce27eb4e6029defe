//! One-shot startup protocol: every managed role writes its pid down a
//! dedicated pipe, the watchdog reads exactly one pid per role.

use std::collections::BTreeMap;
use std::fs::File;
use std::os::fd::OwnedFd;

use anyhow::{bail, Context};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{role::Role, Pid};

pub const IDENTITY_SIZE: usize = 4;

/// Writes the calling process' identity and closes the channel.
pub fn register_self(channel: OwnedFd) -> anyhow::Result<()> {
    register_pid(channel, Pid::current())
}

pub fn register_pid(channel: OwnedFd, pid: Pid) -> anyhow::Result<()> {
    let mut wtr = File::from(channel);
    wtr.write_i32::<LittleEndian>(pid.0).context("could not write identity to registration channel")?;
    Ok(())
}

/// Blocks on each channel in turn until its identity arrives. A channel that
/// closes early or delivers a short identity aborts the whole collection.
pub fn collect_registrations(channels: Vec<(Role, OwnedFd)>) -> anyhow::Result<BTreeMap<Role, Pid>> {
    let mut identities = BTreeMap::new();
    for (role, channel) in channels {
        let mut rdr = File::from(channel);
        let raw = rdr
            .read_i32::<LittleEndian>()
            .with_context(|| format!("registration of {role} failed"))?;
        if raw <= 0 {
            bail!("registration of {role} delivered invalid pid {raw}");
        }
        if identities.insert(role, Pid(raw)).is_some() {
            bail!("{role} registered twice");
        }
    }
    Ok(identities)
}
