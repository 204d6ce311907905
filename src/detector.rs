//! Background detection of the game window.
//!
//! A dedicated thread enumerates top-level windows on a fixed interval and
//! reports presence transitions to a single subscriber. Steady-state polls
//! are silent.

use std::sync::atomic::{AtomicIsize, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::platform::WindowHandle;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_TARGETS: [&str; 2] = ["war3.exe", "Warcraft III.exe"];
pub const DEFAULT_WINDOW_SIGNATURE: &str = "Warcraft III";

/// A top-level window as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub handle: WindowHandle,
    pub class_name: String,
    pub title: String,
    /// Image file name of the owning process, when it could be queried.
    pub process_name: Option<String>,
    pub visible: bool,
}

impl WindowInfo {
    pub fn new(handle: isize, class_name: &str, title: &str) -> Self {
        Self {
            handle: WindowHandle(handle),
            class_name: class_name.to_string(),
            title: title.to_string(),
            process_name: None,
            visible: true,
        }
    }

    pub fn with_process(mut self, process_name: &str) -> Self {
        self.process_name = Some(process_name.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// Window enumeration surface.
pub trait WindowSource: Send + Sync {
    fn windows(&self) -> Vec<WindowInfo>;
}

/// Class name (exact) or title (substring) identifying the game window.
/// Empty fields never match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSignature {
    pub class_name: String,
    pub title: String,
}

impl Default for WindowSignature {
    fn default() -> Self {
        Self {
            class_name: DEFAULT_WINDOW_SIGNATURE.to_string(),
            title: DEFAULT_WINDOW_SIGNATURE.to_string(),
        }
    }
}

impl WindowSignature {
    pub fn matches(&self, window: &WindowInfo) -> bool {
        (!self.class_name.is_empty() && window.class_name == self.class_name)
            || (!self.title.is_empty() && window.title.contains(&self.title))
    }
}

#[derive(Debug, Clone)]
pub struct DetectorOptions {
    pub interval: Duration,
    pub signature: WindowSignature,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            signature: WindowSignature::default(),
        }
    }
}

/// Subscriber invoked with `(is_present, label)` on each transition.
pub type PresenceCallback = Arc<dyn Fn(bool, &str) + Send + Sync>;

const PRESENCE_UNKNOWN: u8 = 0;
const PRESENCE_ABSENT: u8 = 1;
const PRESENCE_PRESENT: u8 = 2;

struct DetectorState {
    source: Arc<dyn WindowSource>,
    options: DetectorOptions,
    targets: RwLock<Vec<String>>,
    callback: Mutex<Option<PresenceCallback>>,
    presence: AtomicU8,
    window: AtomicIsize,
    label: Mutex<String>,
}

impl DetectorState {
    fn find_target(&self) -> Option<(WindowHandle, String)> {
        let targets = self.targets.read().unwrap_or_else(|e| e.into_inner()).clone();
        if targets.is_empty() {
            return None;
        }

        let windows = self.source.windows();
        targets.into_iter().find_map(|target| {
            windows
                .iter()
                .filter(|w| w.visible)
                .find(|w| {
                    w.process_name
                        .as_deref()
                        .is_some_and(|p| p.eq_ignore_ascii_case(&target))
                        || self.options.signature.matches(w)
                })
                .map(|w| (w.handle, w.process_name.clone().unwrap_or(target)))
        })
    }

    fn poll(&self) -> bool {
        let found = self.find_target();
        let present = found.is_some();

        let (handle, label) = match found {
            Some((handle, label)) => (handle.raw(), label),
            None => (0, String::new()),
        };
        self.window.store(handle, Ordering::Release);
        *self.label.lock().unwrap_or_else(|e| e.into_inner()) = label.clone();

        let now = if present { PRESENCE_PRESENT } else { PRESENCE_ABSENT };
        let previous = self.presence.swap(now, Ordering::AcqRel);
        if previous != now {
            if present {
                info!(target_name = %label, window = handle, "Game window detected");
            } else if previous == PRESENCE_PRESENT {
                info!("Game window lost");
            } else {
                debug!("Game window not present");
            }

            let callback = self
                .callback
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone();
            if let Some(callback) = callback {
                callback(present, &label);
            }
        }
        present
    }
}

struct PollingThread {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

pub struct PresenceDetector {
    state: Arc<DetectorState>,
    worker: Mutex<Option<PollingThread>>,
    /// Thread that stopped itself from the callback, joined by the next
    /// `start`, `stop` or drop running elsewhere.
    exited: Mutex<Option<JoinHandle<()>>>,
}

impl PresenceDetector {
    pub fn new(source: Arc<dyn WindowSource>, options: DetectorOptions) -> Self {
        Self {
            state: Arc::new(DetectorState {
                source,
                options,
                targets: RwLock::new(Vec::new()),
                callback: Mutex::new(None),
                presence: AtomicU8::new(PRESENCE_UNKNOWN),
                window: AtomicIsize::new(0),
                label: Mutex::new(String::new()),
            }),
            worker: Mutex::new(None),
            exited: Mutex::new(None),
        }
    }

    /// A detector already watching for `war3.exe` and `Warcraft III.exe`.
    pub fn with_default_targets(source: Arc<dyn WindowSource>, options: DetectorOptions) -> Self {
        let detector = Self::new(source, options);
        for target in DEFAULT_TARGETS {
            detector.add_target(target);
        }
        detector
    }

    /// Adds a process name. Blank and duplicate names (ignoring ASCII case)
    /// are ignored; returns whether the name was added.
    pub fn add_target(&self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let mut targets = self.state.targets.write().unwrap_or_else(|e| e.into_inner());
        if targets.iter().any(|t| t.eq_ignore_ascii_case(name)) {
            return false;
        }
        targets.push(name.to_string());
        debug!(target_name = name, "Detection target added");
        true
    }

    pub fn remove_target(&self, name: &str) -> bool {
        let name = name.trim();
        let mut targets = self.state.targets.write().unwrap_or_else(|e| e.into_inner());
        let before = targets.len();
        targets.retain(|t| !t.eq_ignore_ascii_case(name));
        before != targets.len()
    }

    pub fn clear_targets(&self) {
        self.state
            .targets
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn targets(&self) -> Vec<String> {
        self.state
            .targets
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Registers the single subscriber, replacing any previous one.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(bool, &str) + Send + Sync + 'static,
    {
        *self.state.callback.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(callback));
    }

    /// Runs one detection on the calling thread and notifies the subscriber
    /// if presence changed. Returns the new presence.
    pub fn poll_once(&self) -> bool {
        self.state.poll()
    }

    /// Starts the polling thread. No-op if it is already running.
    pub fn start(&self) -> Result<()> {
        self.reap_exited();
        let mut worker = self.worker.lock().unwrap_or_else(|e| e.into_inner());
        if worker.is_some() {
            warn!("Presence detector already running");
            return Ok(());
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let state = self.state.clone();
        let interval = state.options.interval;
        let handle = thread::Builder::new()
            .name("warkey-presence".to_string())
            .spawn(move || {
                loop {
                    state.poll();
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Presence polling thread exited");
            })?;

        *worker = Some(PollingThread { stop_tx, handle });
        info!(interval_ms = interval.as_millis() as u64, "Presence detector started");
        Ok(())
    }

    /// Stops the polling thread and waits for it to exit. When called from
    /// the subscriber itself the thread is signalled and its handle kept for
    /// a later join; it exits as soon as the callback returns.
    pub fn stop(&self) {
        let worker = self.worker.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(worker) = worker else {
            self.reap_exited();
            return;
        };

        let _ = worker.stop_tx.try_send(());
        drop(worker.stop_tx);
        if worker.handle.thread().id() != thread::current().id() {
            let _ = worker.handle.join();
        } else {
            *self.exited.lock().unwrap_or_else(|e| e.into_inner()) = Some(worker.handle);
        }
        info!("Presence detector stopped");
    }

    fn reap_exited(&self) {
        let mut exited = self.exited.lock().unwrap_or_else(|e| e.into_inner());
        if exited
            .as_ref()
            .is_some_and(|handle| handle.thread().id() != thread::current().id())
            && let Some(handle) = exited.take()
        {
            drop(exited);
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn is_present(&self) -> bool {
        self.state.presence.load(Ordering::Acquire) == PRESENCE_PRESENT
    }

    pub fn current_window(&self) -> Option<WindowHandle> {
        WindowHandle::from_raw(self.state.window.load(Ordering::Acquire))
    }

    /// Target name matched by the last poll, empty when absent.
    pub fn current_label(&self) -> String {
        self.state
            .label
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Drop for PresenceDetector {
    fn drop(&mut self) {
        self.stop();
    }
}
