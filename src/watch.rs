//! Watch mode: rebuild when the config file's content changes.
//!
//! Change events pass through a content-hash gate and a single-slot
//! scheduler: at most one rebuild runs and at most one more is pending.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{RecvTimeoutError, channel};
use std::thread;
use std::time::{Duration, Instant};

use crate::{Error, Result};

const IDLE_TICK: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    /// A rebuild is requested and starts once `deadline` passes.
    Debouncing { deadline: Instant },
    /// A rebuild is in flight; `rerun` records requests made meanwhile.
    Running { rerun: bool },
}

#[derive(Debug, Clone)]
pub struct RebuildScheduler {
    debounce: Duration,
    state: SchedulerState,
}

impl RebuildScheduler {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: SchedulerState::Idle,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Records a change. Bursts inside the debounce window coalesce.
    pub fn request(&mut self, now: Instant) {
        self.state = match self.state {
            SchedulerState::Idle | SchedulerState::Debouncing { .. } => {
                SchedulerState::Debouncing {
                    deadline: now + self.debounce,
                }
            }
            SchedulerState::Running { .. } => SchedulerState::Running { rerun: true },
        };
    }

    /// Returns true when a rebuild should start now; the scheduler is then
    /// `Running` until [`finish`](Self::finish).
    pub fn poll_ready(&mut self, now: Instant) -> bool {
        match self.state {
            SchedulerState::Debouncing { deadline } if now >= deadline => {
                self.state = SchedulerState::Running { rerun: false };
                true
            }
            _ => false,
        }
    }

    pub fn finish(&mut self, now: Instant) {
        self.state = match self.state {
            SchedulerState::Running { rerun: true } => SchedulerState::Debouncing {
                deadline: now + self.debounce,
            },
            SchedulerState::Running { rerun: false } => SchedulerState::Idle,
            other => other,
        };
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            SchedulerState::Debouncing { deadline } => Some(deadline),
            _ => None,
        }
    }
}

/// Last seen SHA-256 of each file; filters out metadata-only events.
#[derive(Debug, Default)]
pub struct ContentHashes {
    digests: HashMap<PathBuf, Vec<u8>>,
}

impl ContentHashes {
    /// True when the file's content differs from the last call, or a
    /// previously seen file disappeared.
    pub fn changed(&mut self, path: &Path) -> bool {
        match fs::read(path) {
            Ok(bytes) => {
                let digest = Sha256::digest(&bytes).to_vec();
                if self.digests.get(path) == Some(&digest) {
                    return false;
                }
                self.digests.insert(path.to_path_buf(), digest);
                true
            }
            Err(_) => self.digests.remove(path).is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    pub poll: bool,
    pub poll_interval_ms: u64,
    pub debounce_ms: u64,
}

pub type BuildFn = Arc<dyn Fn() -> Result<()> + Send + Sync>;

/// Watches `config_path` until the watcher disconnects. The caller is
/// expected to have run the initial build.
pub fn watch(config_path: &Path, options: &WatchOptions, build: BuildFn) -> Result<()> {
    let config_path = config_path
        .canonicalize()
        .map_err(|err| Error::io(config_path, err))?;
    let watch_dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = config_path
        .file_name()
        .map(|name| name.to_os_string())
        .ok_or_else(|| Error::Watch(format!("{} is not a file", config_path.display())))?;

    let (tx, rx) = channel();
    let mut watcher: Box<dyn notify::Watcher> = if options.poll {
        Box::new(
            notify::PollWatcher::new(
                tx,
                notify::Config::default()
                    .with_poll_interval(Duration::from_millis(options.poll_interval_ms)),
            )
            .map_err(|err| Error::Watch(format!("failed to start poll watcher: {}", err)))?,
        )
    } else {
        Box::new(
            notify::recommended_watcher(tx)
                .map_err(|err| Error::Watch(format!("failed to start watcher: {}", err)))?,
        )
    };
    // The directory, not the file: editors often replace files by rename.
    watcher
        .watch(&watch_dir, notify::RecursiveMode::NonRecursive)
        .map_err(|err| Error::Watch(format!("failed to watch {}: {}", watch_dir.display(), err)))?;

    if options.poll {
        tracing::info!("watching {} (polling, press Ctrl+C to stop)", config_path.display());
    } else {
        tracing::info!("watching {} (press Ctrl+C to stop)", config_path.display());
    }

    let mut hashes = ContentHashes::default();
    hashes.changed(&config_path);
    let mut scheduler = RebuildScheduler::new(Duration::from_millis(options.debounce_ms));
    let (done_tx, done_rx) = channel::<()>();

    loop {
        let timeout = scheduler
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_TICK)
            .min(IDLE_TICK);
        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) => {
                let touches_config = event
                    .paths
                    .iter()
                    .any(|path| path.file_name() == Some(file_name.as_os_str()));
                if touches_config && hashes.changed(&config_path) {
                    tracing::debug!(kind = ?event.kind, "config content changed");
                    scheduler.request(Instant::now());
                }
            }
            Ok(Err(err)) => tracing::warn!("watch error: {}", err),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        while done_rx.try_recv().is_ok() {
            scheduler.finish(Instant::now());
        }

        if scheduler.poll_ready(Instant::now()) {
            let build = Arc::clone(&build);
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                tracing::info!("change detected, rebuilding...");
                if let Err(err) = build() {
                    tracing::error!("build failed: {}", err);
                }
                let _ = done_tx.send(());
            });
        }
    }

    Ok(())
}
