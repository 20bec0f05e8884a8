//! Persisted display settings shared by every consumer through one
//! [`SettingsService`] instance.

mod model;
mod service;

pub use model::{Settings, SettingsPatch};
pub use service::{ObserverId, SettingsService, SETTINGS_KEY};
