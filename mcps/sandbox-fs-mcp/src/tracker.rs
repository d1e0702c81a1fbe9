//! Change tracking
//!
//! The OS watcher delivers raw notifications over a channel to a dedicated
//! worker thread. The worker translates them into [`ChangeEvent`]s and
//! appends them to a fixed-capacity ring buffer; readers take a snapshot
//! under the same lock.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::sandbox::Sandbox;
use crate::types::{ChangeEvent, ChangeKind, FsError, FsResult};

/// How long an unpaired rename-from waits for its rename-to
const PENDING_FLUSH: Duration = Duration::from_millis(200);

/// Rename cookies remembered to drop the duplicate two-path event
const SEEN_RENAMES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Stopped,
    Running,
}

/// Fixed-capacity FIFO of change events; the oldest is evicted when full
#[derive(Debug)]
pub struct ChangeBuffer {
    events: VecDeque<ChangeEvent>,
    capacity: usize,
}

impl ChangeBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, event: ChangeEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Up to `limit` events, most recent first
    pub fn recent(&self, limit: usize) -> Vec<ChangeEvent> {
        self.events.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Watches the sandbox recursively and keeps a bounded change history
pub struct ChangeTracker {
    sandbox: Sandbox,
    buffer: Arc<Mutex<ChangeBuffer>>,
    running: Mutex<Option<Running>>,
}

struct Running {
    watcher: RecommendedWatcher,
    stop: Arc<AtomicBool>,
    worker: JoinHandle<()>,
}

impl ChangeTracker {
    pub fn new(sandbox: Sandbox, capacity: usize) -> Self {
        Self {
            sandbox,
            buffer: Arc::new(Mutex::new(ChangeBuffer::new(capacity))),
            running: Mutex::new(None),
        }
    }

    /// Subscribe to notifications under the base directory. No-op when
    /// already running.
    pub fn start(&self) -> FsResult<()> {
        let mut running = lock(&self.running);
        if running.is_some() {
            return Ok(());
        }

        let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
        let mut watcher = notify::recommended_watcher(tx)
            .map_err(|e| FsError::Watch(format!("Failed to create watcher: {}", e)))?;
        watcher
            .watch(self.sandbox.base(), RecursiveMode::Recursive)
            .map_err(|e| FsError::Watch(format!("Failed to watch base directory: {}", e)))?;

        let stop = Arc::new(AtomicBool::new(false));
        let worker = {
            let translator = Translator::new(self.sandbox.clone());
            let buffer = Arc::clone(&self.buffer);
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("change-tracker".to_string())
                .spawn(move || run_worker(rx, translator, buffer, stop))
                .map_err(|e| FsError::Watch(format!("Failed to spawn worker: {}", e)))?
        };

        tracing::info!("File change tracking enabled");
        *running = Some(Running {
            watcher,
            stop,
            worker,
        });
        Ok(())
    }

    /// Unsubscribe and wait for the worker to drain. No-op when stopped.
    pub fn stop(&self) {
        let Some(running) = lock(&self.running).take() else {
            return;
        };

        running.stop.store(true, Ordering::Release);
        drop(running.watcher);
        if running.worker.join().is_err() {
            tracing::warn!("Change tracker worker panicked");
        }
        tracing::info!("File change tracking stopped");
    }

    pub fn state(&self) -> TrackerState {
        if lock(&self.running).is_some() {
            TrackerState::Running
        } else {
            TrackerState::Stopped
        }
    }

    /// Up to `limit` recent events, most recent first
    pub fn recent_changes(&self, limit: usize) -> Vec<ChangeEvent> {
        lock(&self.buffer).recent(limit)
    }

    pub fn capacity(&self) -> usize {
        lock(&self.buffer).capacity()
    }

    /// Append an event as if the OS had reported it
    pub fn record(&self, event: ChangeEvent) {
        lock(&self.buffer).push(event);
    }
}

impl Drop for ChangeTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("state", &self.state())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// A poisoned lock only means a reader or writer panicked mid-call; the
/// buffer itself is always left consistent
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn run_worker(
    rx: Receiver<notify::Result<Event>>,
    mut translator: Translator,
    buffer: Arc<Mutex<ChangeBuffer>>,
    stop: Arc<AtomicBool>,
) {
    let append = |events: Vec<ChangeEvent>| {
        if events.is_empty() {
            return;
        }
        let mut buffer = lock(&buffer);
        for event in events {
            tracing::debug!(path = %event.path, kind = ?event.kind, "File change");
            buffer.push(event);
        }
    };

    loop {
        match rx.recv_timeout(PENDING_FLUSH) {
            Ok(Ok(event)) => append(translator.translate(event)),
            Ok(Err(e)) => tracing::warn!(error = %e, "Watcher error"),
            Err(RecvTimeoutError::Timeout) => {
                append(translator.flush());
                if stop.load(Ordering::Acquire) {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                append(translator.flush());
                break;
            }
        }
    }
}

/// Turns raw notify events into sandbox-relative change events
///
/// Keeps just enough state to pair rename halves: a pending rename-from and
/// the cookies of renames already reported.
struct Translator {
    sandbox: Sandbox,
    pending_from: Option<(usize, PathBuf)>,
    seen_renames: VecDeque<usize>,
}

impl Translator {
    fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox,
            pending_from: None,
            seen_renames: VecDeque::with_capacity(SEEN_RENAMES),
        }
    }

    fn translate(&mut self, event: Event) -> Vec<ChangeEvent> {
        let tracker = event.tracker();

        if let EventKind::Modify(ModifyKind::Name(mode)) = event.kind {
            return self.rename(mode, tracker, event.paths);
        }

        let mut out = self.flush();
        let kind = match event.kind {
            // Reads and closes are not changes
            EventKind::Access(_) => return out,
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Deleted,
            _ => ChangeKind::Modified,
        };
        out.extend(self.each_inside(&event.paths, kind));
        out
    }

    fn rename(
        &mut self,
        mode: RenameMode,
        tracker: Option<usize>,
        paths: Vec<PathBuf>,
    ) -> Vec<ChangeEvent> {
        match mode {
            RenameMode::From => {
                let mut out = self.flush();
                match (tracker, paths.into_iter().next()) {
                    (Some(cookie), Some(from)) => self.pending_from = Some((cookie, from)),
                    (None, Some(from)) => out.extend(self.one_inside(&from, ChangeKind::Deleted)),
                    (_, None) => {}
                }
                out
            }
            RenameMode::To => {
                let Some(to) = paths.into_iter().next() else {
                    return self.flush();
                };
                match self.pending_from.take() {
                    Some((cookie, from)) if Some(cookie) == tracker => {
                        self.remember(cookie);
                        self.moved(&from, &to)
                    }
                    other => {
                        self.pending_from = other;
                        let mut out = self.flush();
                        out.extend(self.one_inside(&to, ChangeKind::Created));
                        out
                    }
                }
            }
            RenameMode::Both => {
                if tracker.is_some_and(|t| self.seen_renames.contains(&t)) {
                    return Vec::new();
                }
                let mut out = self.flush();
                if let [from, to] = paths.as_slice() {
                    out.extend(self.moved(from, to));
                }
                out
            }
            _ => {
                let mut out = self.flush();
                for path in &paths {
                    let kind = if path.exists() {
                        ChangeKind::Created
                    } else {
                        ChangeKind::Deleted
                    };
                    out.extend(self.one_inside(path, kind));
                }
                out
            }
        }
    }

    /// A rename seen from inside the sandbox; an endpoint outside it is
    /// reported as a creation or deletion at the boundary
    fn moved(&self, from: &std::path::Path, to: &std::path::Path) -> Vec<ChangeEvent> {
        match (self.sandbox.relative(from), self.sandbox.relative(to)) {
            (Some(from), Some(to)) => vec![ChangeEvent::moved(from, to)],
            (Some(from), None) => vec![ChangeEvent::new(from, ChangeKind::Deleted)],
            (None, Some(to)) => vec![ChangeEvent::new(to, ChangeKind::Created)],
            (None, None) => Vec::new(),
        }
    }

    /// Emit an unpaired rename-from as a deletion
    fn flush(&mut self) -> Vec<ChangeEvent> {
        match self.pending_from.take() {
            Some((_, from)) => self.one_inside(&from, ChangeKind::Deleted),
            None => Vec::new(),
        }
    }

    fn remember(&mut self, cookie: usize) {
        if self.seen_renames.len() == SEEN_RENAMES {
            self.seen_renames.pop_front();
        }
        self.seen_renames.push_back(cookie);
    }

    fn one_inside(&self, path: &std::path::Path, kind: ChangeKind) -> Vec<ChangeEvent> {
        self.sandbox
            .relative(path)
            .map(|rel| vec![ChangeEvent::new(rel, kind)])
            .unwrap_or_default()
    }

    fn each_inside(&self, paths: &[PathBuf], kind: ChangeKind) -> Vec<ChangeEvent> {
        paths
            .iter()
            .filter_map(|p| self.sandbox.relative(p))
            .map(|rel| ChangeEvent::new(rel, kind))
            .collect()
    }
}
