//! # Watch loop
//!
//! Bridges filesystem notifications for the watch directory to the
//! [`Sorter`].
//!
//! A [`Monitor`] owns the lifecycle (`Stopped -> Starting -> Monitoring ->
//! Stopping -> Stopped`). While monitoring, the `notify` backend turns create
//! and rename notifications into [`FsNotice`]s on a channel; a single worker
//! thread takes them in order, waits until each is at least the settle delay
//! old, and hands the path to the sorter.
//!
//! ## Example
//! ```rust,no_run
//! use sortwatch::config::Config;
//! use sortwatch::events::event_channel;
//! use sortwatch::watcher::Monitor;
//!
//! let (sender, receiver) = event_channel();
//! let monitor = Monitor::new(sender);
//! monitor.start(&Config::default().compile()?)?;
//!
//! while let Some(event) = receiver.recv() {
//!     println!("{}", event.kind.message());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::config::SorterConfig;
use crate::events::{EventKind, EventSender, LogEvent, SortStats};
use crate::sorter::{Sorter, log_event};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, select, unbounded};
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind as FsEventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use thiserror::Error;

/// Errors that prevent monitoring from starting.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch directory doesn't exist: {}", .0.display())]
    WatchDirMissing(PathBuf),

    #[error("Failed to watch {}: {source}", .path.display())]
    Backend {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Lifecycle state of a [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Starting,
    Monitoring,
    Stopping,
}

/// A file that appeared in the watch directory.
#[derive(Debug, Clone)]
pub struct FsNotice {
    pub path: PathBuf,
    /// When the notification arrived; the settle delay counts from here.
    pub received: Instant,
}

impl FsNotice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            received: Instant::now(),
        }
    }
}

/// Feeds notices into a running session's worker.
///
/// The notify backend uses one internally; [`Monitor::start_manual`] hands
/// one out so notices can be injected without an OS watcher.
#[derive(Clone)]
pub struct Dispatcher {
    notices: Sender<FsNotice>,
}

impl Dispatcher {
    /// Queues a notice. Returns false once the session has ended.
    pub fn dispatch(&self, notice: FsNotice) -> bool {
        self.notices.send(notice).is_ok()
    }

    pub fn dispatch_path(&self, path: impl Into<PathBuf>) -> bool {
        self.dispatch(FsNotice::new(path))
    }
}

/// One running session: the worker, its stop signal and the OS watcher.
struct Session {
    watcher: Option<RecommendedWatcher>,
    stop: Sender<()>,
    worker: JoinHandle<()>,
    dispatcher: Dispatcher,
}

impl Session {
    fn spawn(sorter: Sorter) -> Result<Self, WatchError> {
        let (notice_tx, notice_rx) = unbounded::<FsNotice>();
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let worker = thread::Builder::new()
            .name("sortwatch-worker".to_string())
            .spawn(move || run_worker(sorter, notice_rx, stop_rx))?;

        Ok(Self {
            watcher: None,
            stop: stop_tx,
            worker,
            dispatcher: Dispatcher { notices: notice_tx },
        })
    }

    /// Subscribes the OS watcher to `watch_dir`, non-recursively.
    fn attach_watcher(&mut self, watch_dir: &Path) -> Result<(), WatchError> {
        let dispatcher = self.dispatcher.clone();
        let root = WatchRoot::new(watch_dir);

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if let Some(path) = notice_path(&event, &root) {
                        dispatcher.dispatch(FsNotice::new(path));
                    }
                }
                Err(e) => tracing::error!("File watcher error: {}", e),
            }
        })
        .map_err(|source| WatchError::Backend {
            path: watch_dir.to_path_buf(),
            source,
        })?;

        watcher
            .watch(watch_dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Backend {
                path: watch_dir.to_path_buf(),
                source,
            })?;

        self.watcher = Some(watcher);
        Ok(())
    }

    /// Stops notifications, then waits for the worker to finish its current file.
    fn shutdown(self) {
        drop(self.watcher);
        let _ = self.stop.send(());
        drop(self.stop);
        if self.worker.join().is_err() {
            tracing::error!("Sorter worker panicked");
        }
    }
}

struct MonitorInner {
    state: MonitorState,
    session: Option<Session>,
}

/// Starts and stops monitoring sessions.
///
/// Counters in [`Monitor::stats`] belong to the monitor, not to a session, so
/// they keep accumulating across stop/start cycles.
pub struct Monitor {
    stats: Arc<SortStats>,
    events: EventSender,
    inner: Mutex<MonitorInner>,
}

impl Monitor {
    pub fn new(events: EventSender) -> Self {
        Self {
            stats: Arc::new(SortStats::new()),
            events,
            inner: Mutex::new(MonitorInner {
                state: MonitorState::Stopped,
                session: None,
            }),
        }
    }

    pub fn stats(&self) -> Arc<SortStats> {
        Arc::clone(&self.stats)
    }

    pub fn state(&self) -> MonitorState {
        self.lock().state
    }

    pub fn is_monitoring(&self) -> bool {
        self.state() == MonitorState::Monitoring
    }

    /// Starts watching `config.watch_dir` with the OS notification backend.
    ///
    /// The configuration is copied; later changes to `config` do not affect
    /// the running session. Calling this while already monitoring does
    /// nothing.
    pub fn start(&self, config: &SorterConfig) -> Result<(), WatchError> {
        self.start_session(config, true).map(|_| ())
    }

    /// Starts a session with no OS watcher and returns its [`Dispatcher`].
    ///
    /// Useful for feeding paths from another source, and for tests. If a
    /// session is already running its dispatcher is returned.
    pub fn start_manual(&self, config: &SorterConfig) -> Result<Dispatcher, WatchError> {
        self.start_session(config, false)
    }

    fn start_session(&self, config: &SorterConfig, attach: bool) -> Result<Dispatcher, WatchError> {
        let mut inner = self.lock();
        if inner.state == MonitorState::Monitoring
            && let Some(session) = &inner.session
        {
            return Ok(session.dispatcher.clone());
        }

        inner.state = MonitorState::Starting;
        match self.spawn_session(config, attach) {
            Ok(session) => {
                let dispatcher = session.dispatcher.clone();
                inner.session = Some(session);
                inner.state = MonitorState::Monitoring;
                tracing::info!(directory = %config.watch_dir.display(), "Monitoring started");
                self.publish(EventKind::MonitoringStarted {
                    directory: config.watch_dir.clone(),
                });
                Ok(dispatcher)
            }
            Err(e) => {
                inner.state = MonitorState::Stopped;
                self.publish(EventKind::StartFailed {
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn spawn_session(&self, config: &SorterConfig, attach: bool) -> Result<Session, WatchError> {
        if !config.watch_dir.is_dir() {
            return Err(WatchError::WatchDirMissing(config.watch_dir.clone()));
        }

        let sorter = Sorter::new(
            Arc::new(config.clone()),
            Arc::clone(&self.stats),
            self.events.clone(),
        );
        let mut session = Session::spawn(sorter)?;
        if attach && let Err(e) = session.attach_watcher(&config.watch_dir) {
            session.shutdown();
            return Err(e);
        }
        Ok(session)
    }

    /// Stops the current session and waits for the worker to finish.
    ///
    /// Does nothing when not monitoring.
    pub fn stop(&self) {
        let mut inner = self.lock();
        let Some(session) = inner.session.take() else {
            return;
        };

        inner.state = MonitorState::Stopping;
        session.shutdown();
        inner.state = MonitorState::Stopped;
        tracing::info!("Monitoring stopped");
        self.publish(EventKind::MonitoringStopped);
    }

    fn publish(&self, kind: EventKind) {
        let event = LogEvent::new(kind);
        log_event(&event);
        self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, MonitorInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Processes notices in arrival order until stopped.
fn run_worker(sorter: Sorter, notices: Receiver<FsNotice>, stop: Receiver<()>) {
    let settle = sorter.config().settle_delay;

    loop {
        let notice = select! {
            recv(stop) -> _ => break,
            recv(notices) -> msg => match msg {
                Ok(notice) => notice,
                Err(_) => break,
            },
        };

        let remaining = settle.saturating_sub(notice.received.elapsed());
        if !remaining.is_zero() {
            match stop.recv_timeout(remaining) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
        }
        if stop_requested(&stop) {
            break;
        }

        sorter.sort_file(&notice.path);
    }
}

fn stop_requested(stop: &Receiver<()>) -> bool {
    !matches!(stop.try_recv(), Err(TryRecvError::Empty))
}

/// The watch directory as configured and as resolved on disk.
struct WatchRoot {
    configured: PathBuf,
    resolved: Option<PathBuf>,
}

impl WatchRoot {
    fn new(path: &Path) -> Self {
        Self {
            configured: path.to_path_buf(),
            resolved: fs::canonicalize(path).ok(),
        }
    }

    fn is_direct_child(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        if parent == self.configured || Some(parent) == self.resolved.as_deref() {
            return true;
        }
        match (&self.resolved, fs::canonicalize(parent)) {
            (Some(resolved), Ok(parent)) => *resolved == parent,
            _ => false,
        }
    }
}

/// Picks the path a notification is about, or `None` if it should be ignored.
///
/// Creations report the new path and renames report the destination.
/// Directories and anything outside the watch directory itself are skipped.
fn notice_path(event: &Event, root: &WatchRoot) -> Option<PathBuf> {
    let path = match event.kind {
        FsEventKind::Create(CreateKind::Folder) => None,
        FsEventKind::Create(_) => event.paths.first(),
        FsEventKind::Modify(ModifyKind::Name(RenameMode::To))
        | FsEventKind::Modify(ModifyKind::Name(RenameMode::Any)) => event.paths.first(),
        FsEventKind::Modify(ModifyKind::Name(RenameMode::Both)) => event.paths.get(1),
        _ => None,
    }?;

    if !root.is_direct_child(path) {
        tracing::debug!(path = %path.display(), "Ignoring notice outside watch directory");
        return None;
    }
    if path.is_dir() {
        tracing::debug!(path = %path.display(), "Ignoring directory notice");
        return None;
    }
    Some(path.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventReceiver, event_channel};
    use crate::exclusion::ExclusionList;
    use crate::rules::{RuleTable, SortingRule};
    use notify::event::{AccessKind, RemoveKind};
    use std::time::Duration;
    use tempfile::TempDir;

    fn fs_event(kind: FsEventKind, paths: &[&Path]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(path.to_path_buf());
        }
        event
    }

    fn wait_for<F: Fn() -> bool>(condition: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        condition()
    }

    fn kinds(receiver: &EventReceiver) -> Vec<EventKind> {
        receiver.drain().into_iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_notice_path_for_creates_and_renames() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = WatchRoot::new(temp_dir.path());
        let file = temp_dir.path().join("a.pdf");
        let elsewhere = Path::new("/somewhere/else/a.pdf");

        let create = fs_event(FsEventKind::Create(CreateKind::File), &[&file]);
        assert_eq!(notice_path(&create, &root), Some(file.clone()));

        let rename_to = fs_event(
            FsEventKind::Modify(ModifyKind::Name(RenameMode::To)),
            &[&file],
        );
        assert_eq!(notice_path(&rename_to, &root), Some(file.clone()));

        let rename_both = fs_event(
            FsEventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &[elsewhere, &file],
        );
        assert_eq!(notice_path(&rename_both, &root), Some(file.clone()));
    }

    #[test]
    fn test_notice_path_ignores_other_kinds() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = WatchRoot::new(temp_dir.path());
        let file = temp_dir.path().join("a.pdf");

        for kind in [
            FsEventKind::Remove(RemoveKind::File),
            FsEventKind::Modify(ModifyKind::Name(RenameMode::From)),
            FsEventKind::Modify(ModifyKind::Any),
            FsEventKind::Access(AccessKind::Any),
            FsEventKind::Create(CreateKind::Folder),
        ] {
            assert_eq!(notice_path(&fs_event(kind, &[&file]), &root), None);
        }
    }

    #[test]
    fn test_notice_path_ignores_directories_and_nested_paths() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = WatchRoot::new(temp_dir.path());
        let sub = temp_dir.path().join("sub");
        fs::create_dir(&sub).expect("Failed to create subdirectory");

        let dir_created = fs_event(FsEventKind::Create(CreateKind::Any), &[&sub]);
        assert_eq!(notice_path(&dir_created, &root), None);

        let nested = fs_event(FsEventKind::Create(CreateKind::File), &[&sub.join("x.pdf")]);
        assert_eq!(notice_path(&nested, &root), None);
    }

    struct Harness {
        monitor: Monitor,
        receiver: EventReceiver,
        config: SorterConfig,
        temp_dir: TempDir,
    }

    impl Harness {
        fn new(settle: Duration) -> Self {
            let temp_dir = TempDir::new().expect("Failed to create temp directory");
            let watch = temp_dir.path().join("in");
            let docs = temp_dir.path().join("docs");
            fs::create_dir(&watch).expect("Failed to create watch dir");
            fs::create_dir(&docs).expect("Failed to create docs dir");

            let config = SorterConfig::new(
                &watch,
                RuleTable::new(vec![SortingRule::new([".pdf"], &docs)]),
                ExclusionList::new([".part"]),
            )
            .with_settle_delay(settle);
            let (sender, receiver) = event_channel();

            Self {
                monitor: Monitor::new(sender),
                receiver,
                config,
                temp_dir,
            }
        }

        fn watch(&self) -> PathBuf {
            self.temp_dir.path().join("in")
        }

        fn docs(&self) -> PathBuf {
            self.temp_dir.path().join("docs")
        }
    }

    #[test]
    fn test_stop_when_stopped_is_silent() {
        let h = Harness::new(Duration::ZERO);
        h.monitor.stop();
        assert_eq!(h.monitor.state(), MonitorState::Stopped);
        assert!(h.receiver.drain().is_empty());
    }

    #[test]
    fn test_start_with_missing_watch_dir_fails() {
        let h = Harness::new(Duration::ZERO);
        let mut config = h.config.clone();
        config.watch_dir = h.temp_dir.path().join("missing");

        let result = h.monitor.start(&config);
        assert!(matches!(result, Err(WatchError::WatchDirMissing(_))));
        assert_eq!(h.monitor.state(), MonitorState::Stopped);
        assert!(matches!(
            kinds(&h.receiver).as_slice(),
            [EventKind::StartFailed { .. }]
        ));
    }

    #[test]
    fn test_lifecycle_events_and_idempotent_start() {
        let h = Harness::new(Duration::ZERO);
        h.monitor.start_manual(&h.config).expect("Failed to start");
        h.monitor.start_manual(&h.config).expect("Second start failed");
        assert!(h.monitor.is_monitoring());

        h.monitor.stop();
        h.monitor.stop();
        assert_eq!(h.monitor.state(), MonitorState::Stopped);

        let kinds = kinds(&h.receiver);
        assert_eq!(kinds.len(), 2);
        assert!(matches!(kinds[0], EventKind::MonitoringStarted { .. }));
        assert_eq!(kinds[1], EventKind::MonitoringStopped);
    }

    #[test]
    fn test_dispatched_notice_is_sorted() {
        let h = Harness::new(Duration::from_millis(50));
        let dispatcher = h.monitor.start_manual(&h.config).expect("Failed to start");

        let file = h.watch().join("report.pdf");
        fs::write(&file, "pdf").expect("Failed to write file");
        assert!(dispatcher.dispatch_path(&file));

        let moved = h.docs().join("report.pdf");
        assert!(wait_for(|| moved.exists()), "File was not sorted");
        h.monitor.stop();
        assert!(!file.exists());
        assert_eq!(h.monitor.stats().snapshot().files_moved, 1);
    }

    #[test]
    fn test_duplicate_notices_produce_one_move() {
        let h = Harness::new(Duration::ZERO);
        let dispatcher = h.monitor.start_manual(&h.config).expect("Failed to start");

        let file = h.watch().join("twice.pdf");
        fs::write(&file, "pdf").expect("Failed to write file");
        dispatcher.dispatch_path(&file);
        dispatcher.dispatch_path(&file);

        assert!(wait_for(|| h.docs().join("twice.pdf").exists()));
        h.monitor.stop();

        let moved = kinds(&h.receiver)
            .into_iter()
            .filter(|k| matches!(k, EventKind::Moved { .. }))
            .count();
        assert_eq!(moved, 1);
        assert!(!h.docs().join("twice (1).pdf").exists());
    }

    #[test]
    fn test_stop_discards_notices_still_settling() {
        let h = Harness::new(Duration::from_secs(30));
        let dispatcher = h.monitor.start_manual(&h.config).expect("Failed to start");

        let file = h.watch().join("late.pdf");
        fs::write(&file, "pdf").expect("Failed to write file");
        dispatcher.dispatch_path(&file);

        let started = Instant::now();
        h.monitor.stop();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(file.exists());
        assert!(!dispatcher.dispatch_path(&file));
    }

    #[test]
    fn test_counters_survive_restart() {
        let h = Harness::new(Duration::ZERO);

        for name in ["one.pdf", "two.pdf"] {
            let dispatcher = h.monitor.start_manual(&h.config).expect("Failed to start");
            let file = h.watch().join(name);
            fs::write(&file, "pdf").expect("Failed to write file");
            dispatcher.dispatch_path(&file);
            let moved = h.docs().join(name);
            assert!(wait_for(|| moved.exists()));
            h.monitor.stop();
        }

        assert_eq!(h.monitor.stats().snapshot().files_moved, 2);
    }

    #[test]
    fn test_session_uses_config_captured_at_start() {
        let h = Harness::new(Duration::ZERO);
        let mut config = h.config.clone();
        let dispatcher = h.monitor.start_manual(&config).expect("Failed to start");

        // Editing the caller's copy must not reach the running session.
        config.exclusions = ExclusionList::new(["report"]);

        let file = h.watch().join("report.pdf");
        fs::write(&file, "pdf").expect("Failed to write file");
        dispatcher.dispatch_path(&file);

        assert!(wait_for(|| h.docs().join("report.pdf").exists()));
        h.monitor.stop();
    }

    #[test]
    fn test_notify_backend_sorts_new_file() {
        let h = Harness::new(Duration::from_millis(100));
        h.monitor.start(&h.config).expect("Failed to start watcher");

        let file = h.watch().join("incoming.pdf");
        fs::write(&file, "pdf").expect("Failed to write file");

        let moved = h.docs().join("incoming.pdf");
        let sorted = wait_for(|| moved.exists());
        h.monitor.stop();
        assert!(sorted, "Watcher did not sort the new file");
    }
}
