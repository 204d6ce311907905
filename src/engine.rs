//! The remap engine.
//!
//! Owns one [`KeyboardHook`] and one [`MappingTable`]. While running, every
//! physical keystroke goes through [`EngineCore::process_event`] on the hook
//! thread: the toggle key (only while the target is focused), the pause
//! flag, modifier tracking, the foreground-window gate, then a table lookup. A match is replayed as one
//! batch bracketed by the modifiers the original event carried, and the
//! original is suppressed.
//!
//! The hot path only touches atomics and the table lock. Lifecycle
//! transitions are serialized by a separate mutex.

use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crossbeam_channel::Sender;
use smallvec::SmallVec;
use tracing::{error, info, trace, warn};

use crate::error::Result;
use crate::keyboard::{InputBackend, KeyEvent, KeyboardHook, SyntheticKey};
use crate::keys::{self, Modifier};
use crate::mapping::{Category, MappingTable};
use crate::platform::WindowHandle;
use crate::util::{likely, unlikely};

/// Lifecycle of a [`RemapEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Paused,
    Stopping,
}

/// Status messages for the user-facing layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Info(String),
    Warning(String),
    Error(String),
}

/// Modifier keys currently held, as tracked from the event stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

/// A synthesized replacement: up to three modifier presses, the key and
/// three releases.
type ReplayBatch = SmallVec<[SyntheticKey; 8]>;

struct EngineCore {
    hook: KeyboardHook,
    table: Arc<MappingTable>,
    paused: AtomicBool,
    ctrl: AtomicBool,
    alt: AtomicBool,
    shift: AtomicBool,
    /// Raw handle of the gate window; 0 means no target.
    target_window: AtomicIsize,
    /// With no target set, forward everything instead of remapping globally.
    require_target: AtomicBool,
    /// 0 disables the toggle key.
    toggle_key: AtomicU32,
    notifications: OnceLock<Sender<NotificationEvent>>,
}

impl EngineCore {
    #[inline]
    fn modifier_flag(&self, modifier: Modifier) -> &AtomicBool {
        match modifier {
            Modifier::Ctrl => &self.ctrl,
            Modifier::Alt => &self.alt,
            Modifier::Shift => &self.shift,
        }
    }

    fn reset_modifiers(&self) {
        for modifier in Modifier::PRESS_ORDER {
            self.modifier_flag(modifier).store(false, Ordering::Relaxed);
        }
    }

    fn notify(&self, event: NotificationEvent) {
        if let Some(sender) = self.notifications.get() {
            let _ = sender.try_send(event);
        }
    }

    /// Whether the foreground window passes the target gate.
    #[inline]
    fn target_focused(&self) -> bool {
        match self.target_window.load(Ordering::Acquire) {
            0 => !self.require_target.load(Ordering::Acquire),
            target => self.hook.foreground_window().map(WindowHandle::raw) == Some(target),
        }
    }

    /// Returns whether the flag changed.
    fn set_paused(&self, paused: bool) -> bool {
        if self.paused.swap(paused, Ordering::AcqRel) == paused {
            return false;
        }
        let message = if paused {
            "Key remapping paused"
        } else {
            "Key remapping resumed"
        };
        self.notify(NotificationEvent::Info(message.to_string()));
        true
    }

    /// Decides the fate of one physical keystroke. Returns `true` to
    /// suppress it.
    fn process_event(&self, event: &KeyEvent) -> bool {
        let toggle_key = self.toggle_key.load(Ordering::Relaxed);
        if unlikely(toggle_key != 0 && event.vk_code == toggle_key) {
            if !self.target_focused() {
                return false;
            }
            if !event.key_down {
                let paused = !self.paused.load(Ordering::Acquire);
                self.set_paused(paused);
                trace!(paused, "Toggle key released");
            }
            return true;
        }

        if unlikely(self.paused.load(Ordering::Acquire)) {
            return false;
        }

        if let Some(modifier) = Modifier::from_vk(event.vk_code) {
            self.modifier_flag(modifier)
                .store(event.key_down, Ordering::Relaxed);
        }

        if !self.target_focused() {
            return false;
        }

        let Some(resolved) = self.table.resolve(event.vk_code) else {
            return false;
        };
        if unlikely(resolved.mapped_vk == 0) {
            return false;
        }

        let batch = replay_batch(event, resolved.mapped_vk);
        trace!(
            vk = event.vk_code,
            mapped_vk = resolved.mapped_vk,
            category = %resolved.category,
            down = event.key_down,
            "Key remapped"
        );
        self.hook.synthesize(&batch);
        true
    }
}

/// Builds the replacement sequence: held modifiers down in Ctrl, Alt, Shift
/// order, the mapped key with the event's polarity, then the same modifiers
/// up in reverse order.
fn replay_batch(event: &KeyEvent, mapped_vk: u32) -> ReplayBatch {
    let mut batch = ReplayBatch::new();
    for modifier in Modifier::PRESS_ORDER {
        if event.holds(modifier) {
            batch.push(SyntheticKey::modifier(modifier, true));
        }
    }
    batch.push(SyntheticKey::new(
        mapped_vk,
        event.key_down,
        keys::is_extended_vk(mapped_vk),
    ));
    for modifier in Modifier::PRESS_ORDER.into_iter().rev() {
        if event.holds(modifier) {
            batch.push(SyntheticKey::modifier(modifier, false));
        }
    }
    batch
}

pub struct RemapEngine {
    core: Arc<EngineCore>,
    lifecycle: Mutex<EngineState>,
}

impl RemapEngine {
    pub fn new(backend: Arc<dyn InputBackend>) -> Self {
        Self::with_table(backend, Arc::new(MappingTable::new()))
    }

    pub fn with_table(backend: Arc<dyn InputBackend>, table: Arc<MappingTable>) -> Self {
        Self {
            core: Arc::new(EngineCore {
                hook: KeyboardHook::new(backend),
                table,
                paused: AtomicBool::new(false),
                ctrl: AtomicBool::new(false),
                alt: AtomicBool::new(false),
                shift: AtomicBool::new(false),
                target_window: AtomicIsize::new(0),
                require_target: AtomicBool::new(false),
                toggle_key: AtomicU32::new(0),
                notifications: OnceLock::new(),
            }),
            lifecycle: Mutex::new(EngineState::Stopped),
        }
    }

    #[inline]
    fn lifecycle(&self) -> MutexGuard<'_, EngineState> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn table(&self) -> &Arc<MappingTable> {
        &self.core.table
    }

    /// Installs the hook and routes its events to this engine.
    ///
    /// # Errors
    ///
    /// Returns `HookInstallFailed` if the OS refuses the hook; the engine
    /// then stays `Stopped`. Starting a running engine is a no-op.
    pub fn start(&self) -> Result<()> {
        let mut lifecycle = self.lifecycle();
        if *lifecycle == EngineState::Running {
            warn!("Remap engine already running");
            return Ok(());
        }
        *lifecycle = EngineState::Starting;

        // The hook owns the handler and the core owns the hook.
        let core = Arc::downgrade(&self.core);
        self.core.hook.set_handler(move |event| match core.upgrade() {
            Some(core) => core.process_event(event),
            None => false,
        });

        if let Err(e) = self.core.hook.install() {
            self.core.hook.clear_handler();
            *lifecycle = EngineState::Stopped;
            error!("Failed to start remap engine: {e}");
            self.core
                .notify(NotificationEvent::Error(format!("Failed to start: {e}")));
            return Err(e);
        }

        self.core.paused.store(false, Ordering::Release);
        self.core.reset_modifiers();
        *lifecycle = EngineState::Running;
        drop(lifecycle);

        info!(
            mappings = self.core.table.total_len(),
            "Remap engine started"
        );
        self.core
            .notify(NotificationEvent::Info("Key remapping started".to_string()));
        Ok(())
    }

    /// Uninstalls the hook. Safe in any state; once this returns no further
    /// event reaches the engine.
    pub fn stop(&self) {
        let mut lifecycle = self.lifecycle();
        if *lifecycle == EngineState::Stopped {
            return;
        }
        *lifecycle = EngineState::Stopping;

        self.core.hook.uninstall();
        self.core.hook.clear_handler();
        self.core.paused.store(false, Ordering::Release);
        self.core.reset_modifiers();
        *lifecycle = EngineState::Stopped;
        drop(lifecycle);

        info!("Remap engine stopped");
        self.core
            .notify(NotificationEvent::Info("Key remapping stopped".to_string()));
    }

    pub fn pause(&self) {
        let _lifecycle = self.lifecycle();
        if self.core.set_paused(true) {
            info!("Key remapping paused");
        }
    }

    pub fn resume(&self) {
        let _lifecycle = self.lifecycle();
        if self.core.set_paused(false) {
            info!("Key remapping resumed");
        }
    }

    pub fn state(&self) -> EngineState {
        match *self.lifecycle() {
            EngineState::Running if self.core.paused.load(Ordering::Acquire) => EngineState::Paused,
            state => state,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state(), EngineState::Running | EngineState::Paused)
    }

    pub fn is_paused(&self) -> bool {
        self.core.paused.load(Ordering::Acquire)
    }

    /// Restricts remapping to times when `window` is in the foreground.
    /// `None` remaps regardless of focus.
    pub fn set_target_window(&self, window: Option<WindowHandle>) {
        let raw = window.map_or(0, WindowHandle::raw);
        self.core.target_window.store(raw, Ordering::Release);
        info!(window = raw, "Target window set");
    }

    pub fn target_window(&self) -> Option<WindowHandle> {
        WindowHandle::from_raw(self.core.target_window.load(Ordering::Acquire))
    }

    /// When set, a missing target window closes the gate: every event is
    /// forwarded until [`set_target_window`](Self::set_target_window) names
    /// a window again.
    pub fn require_target(&self, required: bool) {
        self.core.require_target.store(required, Ordering::Release);
    }

    /// Applies a presence transition from the detector. A detected window
    /// becomes the target and starts the engine if needed; losing it clears
    /// the target and, with `stop_when_absent`, stops the engine.
    pub fn follow_presence(&self, window: Option<WindowHandle>, stop_when_absent: bool) -> Result<()> {
        self.set_target_window(window);
        match window {
            Some(_) if !self.is_running() => self.start(),
            None if stop_when_absent => {
                self.stop();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Key whose release flips pause/resume. `None` disables it.
    pub fn set_toggle_key(&self, vk_code: Option<u32>) {
        self.core
            .toggle_key
            .store(vk_code.unwrap_or(0), Ordering::Relaxed);
    }

    /// Attaches the notification channel. Only the first sender is kept;
    /// returns whether this one was.
    pub fn set_notification_sender(&self, sender: Sender<NotificationEvent>) -> bool {
        self.core.notifications.set(sender).is_ok()
    }

    pub fn enable_mappings(&self, category: Category, enable: bool) -> usize {
        let touched = self.core.table.set_all_enabled(category, enable);
        info!(%category, enable, touched, "Category mappings toggled");
        touched
    }

    pub fn enable_all_mappings(&self, enable: bool) -> usize {
        let touched = Category::ACTIVE
            .iter()
            .map(|&category| self.core.table.set_all_enabled(category, enable))
            .sum();
        info!(enable, touched, "All mappings toggled");
        touched
    }

    pub fn modifiers(&self) -> ModifierState {
        ModifierState {
            ctrl: self.core.ctrl.load(Ordering::Relaxed),
            alt: self.core.alt.load(Ordering::Relaxed),
            shift: self.core.shift.load(Ordering::Relaxed),
        }
    }

    /// Runs one event through the remapping path as the hook would, without
    /// requiring the hook to be installed.
    pub fn process_event(&self, event: &KeyEvent) -> bool {
        likely(!event.injected) && self.core.process_event(event)
    }
}

impl Drop for RemapEngine {
    fn drop(&mut self) {
        self.stop();
    }
}
