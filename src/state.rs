// Application state management
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use parking_lot::Mutex;
use tokio::runtime::Handle;

use crate::audio::{AudioClipPlayer, DeviceOutputFactory, TokioScheduler};
use crate::settings::{AppSettings, PreferenceScreen, SettingsError};

/// Settings plus a clip player wired to the default audio device
pub struct AppState {
    pub player: AudioClipPlayer,
    pub settings: Arc<Mutex<AppSettings>>,
    pub app_dir: PathBuf,
}

impl AppState {
    /// Load settings from `app_dir` and build a player whose position
    /// updates run on `runtime`
    pub fn new(app_dir: PathBuf, runtime: Handle) -> Result<Self, SettingsError> {
        let settings = AppSettings::load(&app_dir)?;
        let player = AudioClipPlayer::new(
            DeviceOutputFactory::new(settings.playback.volume),
            TokioScheduler::new(runtime),
            &settings.playback,
        );
        info!("Clip player ready (settings in {:?})", app_dir);

        Ok(Self {
            player,
            settings: Arc::new(Mutex::new(settings)),
            app_dir,
        })
    }

    pub fn app_dir(&self) -> &Path {
        &self.app_dir
    }

    pub fn save_settings(&self) -> Result<(), SettingsError> {
        self.settings.lock().save(&self.app_dir)
    }

    pub fn visible_preference_screens(
        &self,
        admin_mode: bool,
        is_release: bool,
    ) -> Vec<PreferenceScreen> {
        self.settings
            .lock()
            .admin
            .visible_screens(admin_mode, is_release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipId;
    use crate::settings::AdminKey;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("audioclips-state-tests")
            .join(format!("{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn test_fresh_state_uses_defaults() {
        let dir = scratch_dir("fresh");
        let state = AppState::new(dir.clone(), Handle::current()).unwrap();

        assert_eq!(*state.settings.lock(), AppSettings::default());
        assert_eq!(state.player.current_clip(), None);
        assert_eq!(state.player.position(&ClipId::new("q1")).get(), 0);
        assert_eq!(state.app_dir(), dir.as_path());
    }

    #[tokio::test]
    async fn test_admin_changes_survive_reload() {
        let dir = scratch_dir("reload");
        {
            let state = AppState::new(dir.clone(), Handle::current()).unwrap();
            state
                .settings
                .lock()
                .admin
                .set(AdminKey::ChangeServer, false);
            state.save_settings().unwrap();
        }

        let state = AppState::new(dir.clone(), Handle::current()).unwrap();
        let screens = state.visible_preference_screens(false, true);

        assert!(!screens.contains(&PreferenceScreen::Protocol));
        assert!(!screens.contains(&PreferenceScreen::Experimental));
        assert!(screens.contains(&PreferenceScreen::Maps));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
