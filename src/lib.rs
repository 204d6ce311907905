//! Core modules for the WarKey hotkey remapper.
//!
//! This library exposes the remapping core for the binary and for tests.
//! The Win32 backend and the console handler only build on Windows;
//! `platform::mock` stands in for them everywhere.

pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod keyboard;
pub mod keys;
pub mod mapping;
pub mod platform;
pub mod profile;
#[cfg(windows)]
pub mod signal;
pub mod util;

// Re-export types for test modules
pub use config::AppConfig;
pub use detector::{DetectorOptions, PresenceDetector, WindowInfo, WindowSignature, WindowSource};
pub use engine::{EngineState, ModifierState, NotificationEvent, RemapEngine};
pub use error::{Result, WarKeyError};
pub use keyboard::{InputBackend, KeyEvent, KeyboardHook, SyntheticKey};
pub use mapping::{Category, MappingEntry, MappingTable};
pub use platform::WindowHandle;
pub use profile::{ConfigSnapshot, ProfileStore};
