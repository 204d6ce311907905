//! OS services used by the hook and the presence detector.
//!
//! `windows` talks to Win32; `mock` lets tests drive the core without hooks.

pub mod mock;

#[cfg(windows)]
pub mod windows;

/// Opaque top-level window handle. Zero is never a valid window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub isize);

impl WindowHandle {
    #[inline]
    pub fn raw(self) -> isize {
        self.0
    }

    /// Maps the null handle to `None`.
    #[inline]
    pub fn from_raw(raw: isize) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }
}
