use std::collections::BTreeMap;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};

use anyhow::{bail, Context};

use crate::{config::SimConfig, pipe, role::Role, Pid};

pub const KEYS_CHANNEL: &str = "keys";
pub const FORCES_CHANNEL: &str = "forces";
pub const OBSTACLES_CHANNEL: &str = "obstacles";
pub const TARGETS_CHANNEL: &str = "targets";

/// Everything a role receives at startup, passed as the single process
/// argument in JSON form.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Handoff {
    #[serde(default)]
    pub channels: BTreeMap<String, RawFd>,
    /// Identities the watchdog must track but cannot learn by registration.
    #[serde(default)]
    pub tracked: BTreeMap<Role, Pid>,
    #[serde(default)]
    pub config: SimConfig,
}

impl Handoff {
    pub fn new(config: SimConfig) -> Handoff {
        Handoff {
            channels: BTreeMap::new(),
            tracked: BTreeMap::new(),
            config,
        }
    }

    pub fn from_args() -> anyhow::Result<Handoff> {
        let Some(arg) = std::env::args().nth(1) else {
            bail!("missing handoff argument");
        };
        Self::parse(&arg)
    }

    pub fn parse(arg: &str) -> anyhow::Result<Handoff> {
        serde_json::from_str(arg).context("malformed handoff argument")
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn insert(&mut self, name: impl Into<String>, fd: RawFd) {
        self.channels.insert(name.into(), fd);
    }

    /// Takes ownership of a named descriptor. Each name can be taken once.
    pub fn take(&mut self, name: &str) -> anyhow::Result<OwnedFd> {
        let fd = self.channels.remove(name).with_context(|| format!("handoff has no channel {name}"))?;
        if !pipe::is_open(fd) {
            bail!("channel {name} refers to closed descriptor {fd}");
        }
        // SAFETY: the descriptor was inherited for this process alone and is
        // removed from the map, so nothing else will wrap it.
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    pub fn take_registration(&mut self, role: Role) -> anyhow::Result<OwnedFd> {
        self.take(&role.registration_channel())
    }
}
