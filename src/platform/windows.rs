//! Win32 implementation of the hook backend and window enumeration.
//!
//! The low-level keyboard hook lives on a dedicated thread that owns a
//! message loop. `WH_KEYBOARD_LL` callbacks carry no user context, so the
//! active [`HookDispatch`] is published in a process-wide slot and only one
//! hook may be installed per process at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::thread::{self, JoinHandle};

use scc::{AtomicShared, Guard, Shared, Tag};
use smallvec::SmallVec;
use tracing::{debug, error};

use windows::Win32::Foundation::{CloseHandle, HWND, LPARAM, LRESULT, MAX_PATH, WPARAM};
use windows::Win32::System::Threading::{
    GetCurrentThreadId, OpenProcess, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
    QueryFullProcessImageNameW,
};
use windows::Win32::UI::Input::KeyboardAndMouse::*;
use windows::Win32::UI::WindowsAndMessaging::*;
use windows::core::{BOOL, PWSTR};

use crate::detector::{WindowInfo, WindowSource};
use crate::error::{Result, WarKeyError};
use crate::keyboard::{HookDispatch, InputBackend, KeyEvent, SIMULATED_EVENT_MARKER, SyntheticKey};
use crate::keys;
use crate::platform::WindowHandle;

/// Set while some backend in this process owns the keyboard hook.
static HOOK_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Dispatch target of the installed hook, read lock-free by the callback.
static ACTIVE_DISPATCH: LazyLock<AtomicShared<Arc<HookDispatch>>> =
    LazyLock::new(AtomicShared::null);

struct HookThread {
    thread_id: u32,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct WindowsBackend {
    hook_thread: Mutex<Option<HookThread>>,
}

impl WindowsBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn release_claim() {
        let _ = ACTIVE_DISPATCH.swap((None, Tag::None), Ordering::Release);
        HOOK_CLAIMED.store(false, Ordering::Release);
    }

    fn run_hook_thread(ready: crossbeam_channel::Sender<std::result::Result<u32, String>>) {
        let thread_id = unsafe { GetCurrentThreadId() };

        // Force create message queue before anyone posts WM_QUIT to us
        unsafe {
            let mut msg = MSG::default();
            let _ = PeekMessageW(&mut msg, None, WM_USER, WM_USER, PM_NOREMOVE);
        }

        let hook = match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_proc), None, 0) }
        {
            Ok(hook) if !hook.0.is_null() => hook,
            Ok(_) => {
                let _ = ready.send(Err("SetWindowsHookExW returned a null handle".to_string()));
                return;
            }
            Err(e) => {
                let _ = ready.send(Err(e.to_string()));
                return;
            }
        };

        let _ = ready.send(Ok(thread_id));

        unsafe {
            let mut msg = MSG::default();
            loop {
                let result = GetMessageW(&mut msg, None, 0, 0);
                if result.0 == 0 || result.0 == -1 {
                    break;
                }
                let _ = TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
            let _ = UnhookWindowsHookEx(hook);
        }
        debug!("Hook thread exited");
    }
}

impl InputBackend for WindowsBackend {
    fn install(&self, dispatch: Arc<HookDispatch>) -> Result<()> {
        let mut slot = self.hook_thread.lock().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return Ok(());
        }

        if HOOK_CLAIMED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WarKeyError::HookInstallFailed(
                "another keyboard hook is already installed in this process".to_string(),
            ));
        }
        let _ = ACTIVE_DISPATCH.swap((Some(Shared::new(dispatch)), Tag::None), Ordering::Release);

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let handle = match thread::Builder::new()
            .name("warkey-hook".to_string())
            .spawn(move || Self::run_hook_thread(ready_tx))
        {
            Ok(handle) => handle,
            Err(e) => {
                Self::release_claim();
                return Err(WarKeyError::HookInstallFailed(e.to_string()));
            }
        };

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                *slot = Some(HookThread { thread_id, handle });
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                Self::release_claim();
                error!(%reason, "SetWindowsHookExW failed");
                Err(WarKeyError::HookInstallFailed(reason))
            }
            Err(_) => {
                let _ = handle.join();
                Self::release_claim();
                Err(WarKeyError::HookInstallFailed(
                    "hook thread exited during installation".to_string(),
                ))
            }
        }
    }

    fn uninstall(&self) {
        let Some(hook_thread) = self
            .hook_thread
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        else {
            return;
        };

        unsafe {
            let _ = PostThreadMessageW(hook_thread.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        // The callback only ever runs on this thread, so once it is joined
        // no further dispatch can happen.
        let _ = hook_thread.handle.join();
        Self::release_claim();
    }

    fn send(&self, keys: &[SyntheticKey]) {
        let mut inputs: SmallVec<[INPUT; 8]> = SmallVec::with_capacity(keys.len());
        for key in keys {
            let mut flags = KEYBD_EVENT_FLAGS(0);
            if !key.key_down {
                flags |= KEYEVENTF_KEYUP;
            }
            if key.extended {
                flags |= KEYEVENTF_EXTENDEDKEY;
            }
            let scan = unsafe { MapVirtualKeyW(key.vk_code, MAPVK_VK_TO_VSC) } as u16;
            inputs.push(INPUT {
                r#type: INPUT_KEYBOARD,
                Anonymous: INPUT_0 {
                    ki: KEYBDINPUT {
                        wVk: VIRTUAL_KEY(key.vk_code as u16),
                        wScan: scan,
                        dwFlags: flags,
                        time: 0,
                        dwExtraInfo: SIMULATED_EVENT_MARKER,
                    },
                },
            });
        }

        unsafe {
            SendInput(&inputs, std::mem::size_of::<INPUT>() as i32);
        }
    }

    fn foreground_window(&self) -> Option<WindowHandle> {
        let hwnd = unsafe { GetForegroundWindow() };
        WindowHandle::from_raw(hwnd.0 as isize)
    }
}

#[inline]
fn key_held(vk: u32) -> bool {
    (unsafe { GetAsyncKeyState(vk as i32) } as u16 & 0x8000) != 0
}

unsafe extern "system" fn keyboard_proc(code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if code < 0 {
        return unsafe { CallNextHookEx(None, code, w_param, l_param) };
    }

    let kb_struct = unsafe { &*(l_param.0 as *const KBDLLHOOKSTRUCT) };
    let key_down = match w_param.0 as u32 {
        WM_KEYDOWN | WM_SYSKEYDOWN => true,
        WM_KEYUP | WM_SYSKEYUP => false,
        _ => return unsafe { CallNextHookEx(None, code, w_param, l_param) },
    };

    let event = KeyEvent {
        vk_code: kb_struct.vkCode,
        scan_code: kb_struct.scanCode,
        extended: (kb_struct.flags & LLKHF_EXTENDED) != KBDLLHOOKSTRUCT_FLAGS(0),
        key_down,
        ctrl: key_held(keys::VK_CONTROL),
        alt: (kb_struct.flags & LLKHF_ALTDOWN) != KBDLLHOOKSTRUCT_FLAGS(0),
        shift: key_held(keys::VK_SHIFT),
        injected: (kb_struct.flags & LLKHF_INJECTED) != KBDLLHOOKSTRUCT_FLAGS(0)
            && kb_struct.dwExtraInfo == SIMULATED_EVENT_MARKER,
        time_ms: kb_struct.time,
    };

    let guard = Guard::new();
    if let Some(dispatch) = ACTIVE_DISPATCH.load(Ordering::Acquire, &guard).as_ref()
        && dispatch.dispatch(&event)
    {
        return LRESULT(1); // swallow the original keystroke
    }

    unsafe { CallNextHookEx(None, code, w_param, l_param) }
}

/// Enumerates visible top-level windows through `EnumWindows`.
#[derive(Default)]
pub struct WindowsWindowSource;

impl WindowsWindowSource {
    pub fn new() -> Self {
        Self
    }

    fn process_name(hwnd: HWND) -> Option<String> {
        unsafe {
            let mut process_id: u32 = 0;
            GetWindowThreadProcessId(hwnd, Some(&mut process_id as *mut u32));
            if process_id == 0 {
                return None;
            }

            let process_handle =
                OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, process_id).ok()?;

            let mut buffer = [0u16; MAX_PATH as usize];
            let mut size = buffer.len() as u32;
            let result = QueryFullProcessImageNameW(
                process_handle,
                PROCESS_NAME_WIN32,
                PWSTR(buffer.as_mut_ptr()),
                &mut size,
            );
            let _ = CloseHandle(process_handle);
            result.ok()?;

            let path = String::from_utf16_lossy(&buffer[..size as usize]);
            path.rsplit(['\\', '/']).next().map(str::to_string)
        }
    }

    fn window_text(hwnd: HWND) -> String {
        let mut buffer = [0u16; 256];
        let len = unsafe { GetWindowTextW(hwnd, &mut buffer) };
        String::from_utf16_lossy(&buffer[..len.max(0) as usize])
    }

    fn class_name(hwnd: HWND) -> String {
        let mut buffer = [0u16; 256];
        let len = unsafe { GetClassNameW(hwnd, &mut buffer) };
        String::from_utf16_lossy(&buffer[..len.max(0) as usize])
    }
}

unsafe extern "system" fn enum_windows_proc(hwnd: HWND, l_param: LPARAM) -> BOOL {
    let windows = unsafe { &mut *(l_param.0 as *mut Vec<WindowInfo>) };

    if unsafe { IsWindowVisible(hwnd) }.as_bool() {
        windows.push(WindowInfo {
            handle: WindowHandle(hwnd.0 as isize),
            class_name: WindowsWindowSource::class_name(hwnd),
            title: WindowsWindowSource::window_text(hwnd),
            process_name: WindowsWindowSource::process_name(hwnd),
            visible: true,
        });
    }

    BOOL(1) // continue enumeration
}

impl WindowSource for WindowsWindowSource {
    fn windows(&self) -> Vec<WindowInfo> {
        let mut windows: Vec<WindowInfo> = Vec::new();
        unsafe {
            let _ = EnumWindows(
                Some(enum_windows_proc),
                LPARAM(&mut windows as *mut Vec<WindowInfo> as isize),
            );
        }
        windows
    }
}
