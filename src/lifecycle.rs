//! Process lifecycle: single-instance lock, daemonization and graceful stop
//!
//! ```text
//! STARTING -> RUNNING -> STOPPING -> STOPPED
//! ```
//!
//! The lock is taken before anything touches a device or the store. A stop
//! signal only cancels a token; the poll loop notices it between cycles.

use crate::error::{Result, ThermologError};
use std::fmt;
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Stopping => "STOPPING",
            Self::Stopped => "STOPPED",
        })
    }
}

/// Tracks and logs lifecycle transitions
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: LifecycleState::Starting,
        }
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn enter(&mut self, next: LifecycleState) {
        info!("{} -> {}", self.state, next);
        self.state = next;
    }
}

/// Exclusive lock on the instance lock file, held for the life of the process
#[derive(Debug)]
pub struct InstanceLock {
    file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock without blocking.
    ///
    /// Fails with `InstanceLocked` when another process holds it.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| {
                ThermologError::config(format!("Cannot open lock file {}: {e}", path.display()))
            })?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(ThermologError::instance_locked(format!(
                    "another instance holds {}",
                    path.display()
                )))
            }
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }

        let mut lock = Self {
            file,
            path: path.to_path_buf(),
        };
        lock.record_pid()?;
        Ok(lock)
    }

    /// Write the current pid into the lock file; call again after forking
    pub fn record_pid(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        writeln!(self.file, "{}", std::process::id())?;
        self.file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Detach from the terminal.
///
/// Standard output and error are redirected to `log_destination` when given,
/// otherwise discarded. Paths must already be absolute since the child runs
/// from `/`. Only the child returns.
pub fn daemonize(log_destination: Option<&Path>) -> Result<()> {
    let mut daemon = daemonize::Daemonize::new().working_directory("/");

    if let Some(path) = log_destination {
        let open = || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    ThermologError::daemonize(format!(
                        "Cannot open log destination {}: {e}",
                        path.display()
                    ))
                })
        };
        daemon = daemon.stdout(open()?).stderr(open()?);
    }

    daemon
        .start()
        .map_err(|e| ThermologError::daemonize(e.to_string()))
}

/// Stop flag shared between signal listeners and the poll loop
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    token: CancellationToken,
    signal: Arc<OnceLock<&'static str>>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `name` if no signal was recorded yet, then cancel
    pub fn trigger(&self, name: &'static str) {
        if self.signal.set(name).is_ok() {
            info!("received {}", name);
        }
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// First signal received, if any
    pub fn signal_name(&self) -> Option<&'static str> {
        self.signal.get().copied()
    }

    /// Spawn one listener task per stop signal on the current runtime
    #[cfg(unix)]
    pub fn listen(&self) -> Result<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let kinds = [
            (SignalKind::terminate(), "SIGTERM"),
            (SignalKind::interrupt(), "SIGINT"),
            (SignalKind::hangup(), "SIGHUP"),
            (SignalKind::quit(), "SIGQUIT"),
        ];

        for (kind, name) in kinds {
            let mut stream = signal(kind)?;
            let stop = self.clone();
            tokio::spawn(async move {
                if stream.recv().await.is_some() {
                    stop.trigger(name);
                }
            });
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn listen(&self) -> Result<()> {
        let stop = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.trigger("SIGINT");
            }
        });
        Ok(())
    }
}
