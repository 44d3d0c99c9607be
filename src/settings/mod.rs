// Settings: persisted playback configuration and admin-controlled visibility

pub mod admin;
pub mod settings;

pub use admin::{AdminKey, AdminSettings, PreferenceScreen};
pub use settings::{AppSettings, PlaybackSettings, SettingsError};
