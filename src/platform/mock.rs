//! In-process stand-ins for the OS services.
//!
//! [`MockBackend`] records injected keys and lets tests feed events through
//! the installed dispatch; [`MockWindowSource`] serves a scripted window list.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::detector::{WindowInfo, WindowSource};
use crate::error::{Result, WarKeyError};
use crate::keyboard::{HookDispatch, InputBackend, KeyEvent, SyntheticKey};
use crate::platform::WindowHandle;

#[derive(Default)]
pub struct MockBackend {
    dispatch: Mutex<Option<Arc<HookDispatch>>>,
    sent: Mutex<Vec<SyntheticKey>>,
    foreground: Mutex<Option<WindowHandle>>,
    refuse_install: AtomicBool,
    loopback: AtomicBool,
    install_count: AtomicUsize,
    loopback_suppressed: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent installs fail like a refused `SetWindowsHookEx`.
    pub fn refuse_install(&self, refuse: bool) {
        self.refuse_install.store(refuse, Ordering::Relaxed);
    }

    /// Re-delivers every injected key to the hook, as the OS does.
    pub fn set_loopback(&self, enabled: bool) {
        self.loopback.store(enabled, Ordering::Relaxed);
    }

    pub fn set_foreground(&self, window: Option<WindowHandle>) {
        *self.foreground.lock().unwrap_or_else(|e| e.into_inner()) = window;
    }

    /// Delivers an event as the OS would. Returns whether it was suppressed.
    pub fn feed(&self, event: &KeyEvent) -> bool {
        let dispatch = self
            .dispatch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        match dispatch {
            Some(dispatch) => dispatch.dispatch(event),
            None => false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.dispatch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    pub fn install_count(&self) -> usize {
        self.install_count.load(Ordering::Relaxed)
    }

    /// Looped-back injected events the hook suppressed. Must stay zero.
    pub fn loopback_suppressed(&self) -> usize {
        self.loopback_suppressed.load(Ordering::Relaxed)
    }

    pub fn sent(&self) -> Vec<SyntheticKey> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn take_sent(&self) -> Vec<SyntheticKey> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl InputBackend for MockBackend {
    fn install(&self, dispatch: Arc<HookDispatch>) -> Result<()> {
        if self.refuse_install.load(Ordering::Relaxed) {
            return Err(WarKeyError::HookInstallFailed(
                "hook registration refused".to_string(),
            ));
        }
        *self.dispatch.lock().unwrap_or_else(|e| e.into_inner()) = Some(dispatch);
        self.install_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn uninstall(&self) {
        *self.dispatch.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn send(&self, keys: &[SyntheticKey]) {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(keys);

        if self.loopback.load(Ordering::Relaxed) {
            for key in keys {
                let mut event = if key.key_down {
                    KeyEvent::key_down(key.vk_code)
                } else {
                    KeyEvent::key_up(key.vk_code)
                };
                event.extended = key.extended;
                if self.feed(&event.injected()) {
                    self.loopback_suppressed.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        *self.foreground.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Default)]
pub struct MockWindowSource {
    windows: Mutex<Vec<WindowInfo>>,
    enumerations: AtomicUsize,
}

impl MockWindowSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_windows(&self, windows: Vec<WindowInfo>) {
        *self.windows.lock().unwrap_or_else(|e| e.into_inner()) = windows;
    }

    pub fn clear(&self) {
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn enumerations(&self) -> usize {
        self.enumerations.load(Ordering::Relaxed)
    }
}

impl WindowSource for MockWindowSource {
    fn windows(&self) -> Vec<WindowInfo> {
        self.enumerations.fetch_add(1, Ordering::Relaxed);
        self.windows
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
