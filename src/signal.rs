use std::sync::OnceLock;

use crossbeam_channel::Sender;
use windows::Win32::System::Console::*;
use windows::core::*;

static SHUTDOWN: OnceLock<Sender<()>> = OnceLock::new();

/// Routes Ctrl-C, Ctrl-Break and console close to `shutdown`.
pub fn set_control_ctrl_handler(shutdown: Sender<()>) -> Result<()> {
    let _ = SHUTDOWN.set(shutdown);
    unsafe { SetConsoleCtrlHandler(Some(console_handler), true) }
}

#[allow(non_snake_case)]
unsafe extern "system" fn console_handler(ctrl_type: u32) -> BOOL {
    match ctrl_type {
        CTRL_C_EVENT | CTRL_BREAK_EVENT | CTRL_CLOSE_EVENT => {
            match SHUTDOWN.get().map(|tx| tx.try_send(())) {
                Some(Ok(())) => {}                   // graceful shutdown
                Some(Err(e)) if e.is_full() => {}    // already requested
                _ => std::process::exit(0),          // force shutdown
            }
            BOOL(1) // Event has been handled
        }
        _ => BOOL(0), // Leave other events to the default handler
    }
}
