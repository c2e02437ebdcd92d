//! Player process lifecycle.
//!
//! The daemon record is a PID file: its presence alone means "a player is
//! running". Creation uses exclusive `create_new` so two concurrent starts
//! cannot both succeed; the record content is the child PID as decimal text.
//!
//! The record is not cross-checked against the OS process table: a record
//! left behind by a crashed player keeps reporting `Running` until it is
//! deleted by hand. Both the controller (on `stop`, best-effort) and the
//! player itself (on clean exit) delete the record; deleting an already
//! absent record is fine.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("a player is already running")]
    AlreadyRunning,

    #[error("no player is running")]
    NotRunning,

    #[error("daemon record is unreadable: {0}")]
    BadRecord(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What the daemon record says.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DaemonStatus {
    Stopped,
    Running(u32),
}

/// Flags forwarded to the player process.
#[derive(Clone, Debug, Default)]
pub struct PlayerOptions {
    pub shuffle: bool,
    pub device: Option<String>,
}

/// Spawning seam: production forks a detached OS process, tests substitute
/// an in-process fake so lifecycle logic runs without real children.
pub trait PlayerSpawner {
    fn spawn_player(&self, opts: &PlayerOptions) -> std::io::Result<u32>;
}

/// Re-executes the current binary in player mode, detached from the terminal.
pub struct DetachedSpawner;

impl PlayerSpawner for DetachedSpawner {
    fn spawn_player(&self, opts: &PlayerOptions) -> std::io::Result<u32> {
        let exe = std::env::current_exe()?;
        let mut cmd = Command::new(exe);
        cmd.arg("player");
        if opts.shuffle {
            cmd.arg("--shuffle");
        }
        if let Some(device) = &opts.device {
            cmd.args(["--device", device]);
        }
        let child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        Ok(child.id())
    }
}

/// Start a player process and record its PID.
///
/// Fails with [`SupervisorError::AlreadyRunning`] when a record exists —
/// without probing whether that PID is still alive. On spawn failure the
/// reserved record is removed again, leaving no side effects.
pub fn start(
    pid_file: &Path,
    spawner: &dyn PlayerSpawner,
    opts: &PlayerOptions,
) -> Result<u32, SupervisorError> {
    let mut record = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(pid_file)
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            return Err(SupervisorError::AlreadyRunning);
        }
        Err(e) => return Err(e.into()),
    };

    let pid = match spawner.spawn_player(opts) {
        Ok(pid) => pid,
        Err(e) => {
            drop(record);
            let _ = fs::remove_file(pid_file);
            return Err(e.into());
        }
    };

    record.write_all(pid.to_string().as_bytes())?;
    tracing::info!(pid, "player started");
    Ok(pid)
}

/// Report the record's view of the player, without a liveness probe.
pub fn status(pid_file: &Path) -> Result<DaemonStatus, SupervisorError> {
    match read_record(pid_file)? {
        Some(pid) => Ok(DaemonStatus::Running(pid)),
        None => Ok(DaemonStatus::Stopped),
    }
}

/// Ask the recorded player to stop after its current track.
///
/// Sends the graceful termination signal, then best-effort deletes the
/// record; the player deletes it too on clean exit and the double deletion
/// is harmless. Returns the signalled PID.
pub fn stop(pid_file: &Path) -> Result<u32, SupervisorError> {
    let pid = read_record(pid_file)?.ok_or(SupervisorError::NotRunning)?;

    if let Err(e) = send_terminate(pid) {
        tracing::warn!(pid, "could not signal player: {e}");
    }
    clear_record(pid_file);

    Ok(pid)
}

/// Delete the daemon record; an already absent record is not an error.
pub fn clear_record(pid_file: &Path) {
    match fs::remove_file(pid_file) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("could not remove daemon record: {e}"),
    }
}

fn read_record(pid_file: &Path) -> Result<Option<u32>, SupervisorError> {
    let raw = match fs::read_to_string(pid_file) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let pid = raw
        .trim()
        .parse::<u32>()
        .map_err(|_| SupervisorError::BadRecord(raw.trim().to_string()))?;
    Ok(Some(pid))
}

#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<(), String> {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM).map_err(|e| e.to_string())
}

#[cfg(not(unix))]
fn send_terminate(_pid: u32) -> Result<(), String> {
    Err("graceful termination is not supported on this platform".to_string())
}
