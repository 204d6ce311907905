//! System-wide keyboard interception.
//!
//! [`KeyboardHook`] owns an [`InputBackend`] (the OS hook plus `SendInput`)
//! and a [`HookDispatch`] slot holding the single registered handler. The
//! backend calls [`HookDispatch::dispatch`] synchronously for every raw event;
//! the returned boolean tells it whether to swallow the original keystroke.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use scc::{AtomicShared, Guard, Shared, Tag};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::keys::{self, Modifier};
use crate::platform::WindowHandle;
use crate::util::unlikely;

/// Marker stamped into `dwExtraInfo` of every event this process injects.
pub const SIMULATED_EVENT_MARKER: usize = 0x574B;

/// One physical keystroke, normalized at interception time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub vk_code: u32,
    pub scan_code: u32,
    pub extended: bool,
    pub key_down: bool,
    /// Modifier flags sampled from the OS when the event was intercepted.
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    /// Set when the event carries this process's injection marker.
    pub injected: bool,
    /// OS tick count in milliseconds.
    pub time_ms: u32,
}

impl KeyEvent {
    pub fn key_down(vk_code: u32) -> Self {
        Self::new(vk_code, true)
    }

    pub fn key_up(vk_code: u32) -> Self {
        Self::new(vk_code, false)
    }

    fn new(vk_code: u32, key_down: bool) -> Self {
        Self {
            vk_code,
            scan_code: 0,
            extended: keys::is_extended_vk(vk_code),
            key_down,
            ctrl: false,
            alt: false,
            shift: false,
            injected: false,
            time_ms: 0,
        }
    }

    pub fn with_modifiers(mut self, ctrl: bool, alt: bool, shift: bool) -> Self {
        self.ctrl = ctrl;
        self.alt = alt;
        self.shift = shift;
        self
    }

    pub fn injected(mut self) -> Self {
        self.injected = true;
        self
    }

    /// Whether the given modifier was held when the event was intercepted.
    #[inline]
    pub fn holds(&self, modifier: Modifier) -> bool {
        match modifier {
            Modifier::Ctrl => self.ctrl,
            Modifier::Alt => self.alt,
            Modifier::Shift => self.shift,
        }
    }
}

/// A keyboard event to inject into the system input stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntheticKey {
    pub vk_code: u32,
    pub key_down: bool,
    pub extended: bool,
}

impl SyntheticKey {
    pub const fn new(vk_code: u32, key_down: bool, extended: bool) -> Self {
        Self {
            vk_code,
            key_down,
            extended,
        }
    }

    /// Modifier events use the generic virtual key and are never extended.
    pub const fn modifier(modifier: Modifier, key_down: bool) -> Self {
        Self::new(modifier.vk(), key_down, false)
    }
}

/// Handler invoked for every intercepted event; `true` suppresses it.
pub type KeyHandler = Box<dyn Fn(&KeyEvent) -> bool + Send + Sync>;

/// Routes raw events from the backend to the registered handler.
pub struct HookDispatch {
    handler: AtomicShared<KeyHandler>,
}

impl Default for HookDispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl HookDispatch {
    pub fn new() -> Self {
        Self {
            handler: AtomicShared::null(),
        }
    }

    /// Runs on the OS callback stack. Never blocks.
    ///
    /// Self-injected events are always forwarded without reaching the handler,
    /// so replayed keys cannot re-enter the remapping path.
    #[inline]
    pub fn dispatch(&self, event: &KeyEvent) -> bool {
        if unlikely(event.injected) {
            return false;
        }

        let guard = Guard::new();
        match self.handler.load(Ordering::Acquire, &guard).as_ref() {
            Some(handler) => handler(event),
            None => false,
        }
    }

    pub fn has_handler(&self) -> bool {
        let guard = Guard::new();
        !self.handler.load(Ordering::Acquire, &guard).is_null()
    }

    fn set(&self, handler: KeyHandler) {
        let _ = self
            .handler
            .swap((Some(Shared::new(handler)), Tag::None), Ordering::Release);
    }

    fn clear(&self) {
        let _ = self.handler.swap((None, Tag::None), Ordering::Release);
    }
}

/// OS services behind the hook: interception, injection and focus query.
pub trait InputBackend: Send + Sync {
    /// Registers the low-level hook and routes its events to `dispatch`.
    fn install(&self, dispatch: Arc<HookDispatch>) -> Result<()>;
    /// Removes the hook. After this returns no further dispatch happens.
    fn uninstall(&self);
    /// Injects the keys in order as one batch. Best-effort.
    fn send(&self, keys: &[SyntheticKey]);
    /// Current foreground window, if any.
    fn foreground_window(&self) -> Option<WindowHandle>;
}

pub struct KeyboardHook {
    backend: Arc<dyn InputBackend>,
    dispatch: Arc<HookDispatch>,
    installed: Mutex<bool>,
}

impl KeyboardHook {
    pub fn new(backend: Arc<dyn InputBackend>) -> Self {
        Self {
            backend,
            dispatch: Arc::new(HookDispatch::new()),
            installed: Mutex::new(false),
        }
    }

    /// Installs the hook. Calling it while installed is a no-op success.
    pub fn install(&self) -> Result<()> {
        let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
        if *installed {
            warn!("Keyboard hook already installed");
            return Ok(());
        }

        self.backend.install(self.dispatch.clone())?;
        *installed = true;
        info!("Keyboard hook installed");
        Ok(())
    }

    /// Removes the hook. Idempotent.
    pub fn uninstall(&self) {
        let mut installed = self.installed.lock().unwrap_or_else(|e| e.into_inner());
        if !*installed {
            return;
        }

        self.backend.uninstall();
        *installed = false;
        info!("Keyboard hook uninstalled");
    }

    pub fn is_installed(&self) -> bool {
        *self.installed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers the event handler, replacing any previous one.
    pub fn set_handler<F>(&self, handler: F)
    where
        F: Fn(&KeyEvent) -> bool + Send + Sync + 'static,
    {
        self.dispatch.set(Box::new(handler));
        debug!("Keyboard handler registered");
    }

    pub fn clear_handler(&self) {
        self.dispatch.clear();
    }

    pub fn synthesize_key(&self, vk_code: u32, key_down: bool, extended: bool) {
        self.backend
            .send(&[SyntheticKey::new(vk_code, key_down, extended)]);
    }

    pub fn synthesize_modifier(&self, modifier: Modifier, key_down: bool) {
        self.backend.send(&[SyntheticKey::modifier(modifier, key_down)]);
    }

    /// Injects a prepared sequence in a single call so physical input
    /// cannot interleave with it.
    pub fn synthesize(&self, keys: &[SyntheticKey]) {
        if !keys.is_empty() {
            self.backend.send(keys);
        }
    }

    #[inline]
    pub fn foreground_window(&self) -> Option<WindowHandle> {
        self.backend.foreground_window()
    }
}

impl Drop for KeyboardHook {
    fn drop(&mut self) {
        self.uninstall();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockBackend;

    #[test]
    fn test_dispatch_without_handler_forwards() {
        let dispatch = HookDispatch::new();
        assert!(!dispatch.has_handler());
        assert!(!dispatch.dispatch(&KeyEvent::key_down(0x41)));
    }

    #[test]
    fn test_dispatch_never_passes_injected_events_to_handler() {
        let dispatch = HookDispatch::new();
        dispatch.set(Box::new(|_| true));

        assert!(dispatch.dispatch(&KeyEvent::key_down(0x41)));
        assert!(!dispatch.dispatch(&KeyEvent::key_down(0x41).injected()));
    }

    #[test]
    fn test_set_handler_replaces_previous() {
        let backend = Arc::new(MockBackend::new());
        let hook = KeyboardHook::new(backend.clone());
        hook.install().unwrap();

        hook.set_handler(|_| true);
        assert!(backend.feed(&KeyEvent::key_down(0x41)));

        hook.set_handler(|_| false);
        assert!(!backend.feed(&KeyEvent::key_down(0x41)));
    }

    #[test]
    fn test_install_and_uninstall_are_idempotent() {
        let backend = Arc::new(MockBackend::new());
        let hook = KeyboardHook::new(backend.clone());

        hook.install().unwrap();
        hook.install().unwrap();
        assert!(hook.is_installed());
        assert_eq!(backend.install_count(), 1);

        hook.uninstall();
        hook.uninstall();
        assert!(!hook.is_installed());
        assert!(!backend.is_installed());
    }

    #[test]
    fn test_install_failure_is_reported() {
        let backend = Arc::new(MockBackend::new());
        backend.refuse_install(true);
        let hook = KeyboardHook::new(backend);

        assert!(hook.install().is_err());
        assert!(!hook.is_installed());
    }

    #[test]
    fn test_synthesize_modifier_uses_generic_vk() {
        let backend = Arc::new(MockBackend::new());
        let hook = KeyboardHook::new(backend.clone());

        hook.synthesize_modifier(Modifier::Alt, true);
        hook.synthesize_key(0x26, false, true);

        assert_eq!(
            backend.sent(),
            vec![
                SyntheticKey::new(keys::VK_MENU, true, false),
                SyntheticKey::new(0x26, false, true),
            ]
        );
    }
}
