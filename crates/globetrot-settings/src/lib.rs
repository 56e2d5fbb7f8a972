//! # globetrot-settings
//!
//! Layered configuration for the globetrot hub.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`GlobetrotSettings::default()`]
//! 2. **User file**: `~/.globetrot/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `PORT` and `GLOBETROT_*` overrides
//!
//! The result is validated before it is returned.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_overrides, deep_merge, load_settings_from_path, load_settings_with, settings_path,
};
pub use types::{
    GlobetrotSettings, LoggingSettings, NameSettings, PresenceSettings, ServerSettings,
};
