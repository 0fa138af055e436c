//! fleetpull core library: item types, manifest loading and settings.
//!
//! - [`types`]: [`PullItem`] and its identity [`ItemId`]
//! - [`manifest`]: manifest document, loader and the item builder
//! - [`settings`]: resolved [`Settings`] and override layering
//! - [`error`]: [`ConfigurationError`]

pub mod error;
pub mod manifest;
pub mod settings;
pub mod types;

pub use error::ConfigurationError;
pub use manifest::{build_items, ItemFilters, Manifest, ManifestSource};
pub use settings::{Settings, SettingsOverride};
pub use types::{ItemId, ItemKind, PullItem};
