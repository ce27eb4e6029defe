use std::fmt::Display;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;

use crate::role::Role;

pub const WATCHDOG_LOG: &str = "watchdogLog.txt";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stamp {
    /// `YYYY-MM-DD HH:MM:SS`
    Long,
    /// `HH:MM:SS`
    Short,
}

impl Stamp {
    fn format(&self) -> &'static str {
        match self {
            Stamp::Long => "%Y-%m-%d %H:%M:%S",
            Stamp::Short => "%H:%M:%S",
        }
    }

    pub fn now(&self) -> String {
        Local::now().format(self.format()).to_string()
    }
}

/// Line oriented, timestamped, output only.
pub struct RoleLog {
    file: File,
    path: PathBuf,
    stamp: Stamp,
}

impl RoleLog {
    /// Truncates any log the role left over from a previous run.
    pub fn for_role(dir: impl AsRef<Path>, role: Role, stamp: Stamp) -> anyhow::Result<RoleLog> {
        Self::create(dir, &role.log_file_name(), stamp)
    }

    pub fn create(dir: impl AsRef<Path>, file_name: &str, stamp: Stamp) -> anyhow::Result<RoleLog> {
        Self::open(dir.as_ref(), file_name, stamp, false)
    }

    pub fn append(dir: impl AsRef<Path>, file_name: &str, stamp: Stamp) -> anyhow::Result<RoleLog> {
        Self::open(dir.as_ref(), file_name, stamp, true)
    }

    fn open(dir: &Path, file_name: &str, stamp: Stamp, append: bool) -> anyhow::Result<RoleLog> {
        fs::create_dir_all(dir).with_context(|| format!("could not create log directory {}", dir.display()))?;
        let path = dir.join(file_name);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .with_context(|| format!("could not open log file {}", path.display()))?;
        Ok(RoleLog { file, path, stamp })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, msg: impl Display) {
        let stamp = self.stamp.now();
        let result = writeln!(self.file, "[{stamp}] {msg}").and_then(|_| self.file.flush());
        if let Err(e) = result {
            println!("error while writing to {}: {e}", self.path.display());
        }
    }
}
