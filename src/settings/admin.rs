// Admin-controlled settings and which preference screens they expose
//
// Every key is a boolean that an administrator can switch off to hide the
// corresponding user setting. Keys that were never set count as enabled.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminKey {
    // Server
    ChangeServer,

    // User interface
    ChangeAppTheme,
    ChangeAppLanguage,
    ChangeFontSize,
    ChangeNavigation,
    ShowSplashScreen,

    // Maps
    Maps,

    // Form management
    FormUpdateMode,
    PeriodicFormUpdatesCheck,
    AutomaticUpdate,
    HideOldFormVersions,
    ChangeAutosend,
    DeleteAfterSend,
    DefaultToFinalized,
    ChangeConstraintBehavior,
    HighResolution,
    ImageSize,
    GuidanceHint,
    ExternalAppRecording,
    InstanceFormSync,

    // User and device identity
    ChangeFormMetadata,
    Analytics,
}

impl AdminKey {
    pub const SERVER: &'static [AdminKey] = &[AdminKey::ChangeServer];

    pub const USER_INTERFACE: &'static [AdminKey] = &[
        AdminKey::ChangeAppTheme,
        AdminKey::ChangeAppLanguage,
        AdminKey::ChangeFontSize,
        AdminKey::ChangeNavigation,
        AdminKey::ShowSplashScreen,
    ];

    pub const MAPS: &'static [AdminKey] = &[AdminKey::Maps];

    pub const FORM_MANAGEMENT: &'static [AdminKey] = &[
        AdminKey::FormUpdateMode,
        AdminKey::PeriodicFormUpdatesCheck,
        AdminKey::AutomaticUpdate,
        AdminKey::HideOldFormVersions,
        AdminKey::ChangeAutosend,
        AdminKey::DeleteAfterSend,
        AdminKey::DefaultToFinalized,
        AdminKey::ChangeConstraintBehavior,
        AdminKey::HighResolution,
        AdminKey::ImageSize,
        AdminKey::GuidanceHint,
        AdminKey::ExternalAppRecording,
        AdminKey::InstanceFormSync,
    ];

    pub const IDENTITY: &'static [AdminKey] =
        &[AdminKey::ChangeFormMetadata, AdminKey::Analytics];
}

/// Top level groups of the general settings screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreferenceScreen {
    Protocol,
    UserInterface,
    Maps,
    FormManagement,
    UserAndDeviceIdentity,
    Experimental,
}

impl PreferenceScreen {
    pub const ALL: [PreferenceScreen; 6] = [
        PreferenceScreen::Protocol,
        PreferenceScreen::UserInterface,
        PreferenceScreen::Maps,
        PreferenceScreen::FormManagement,
        PreferenceScreen::UserAndDeviceIdentity,
        PreferenceScreen::Experimental,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PreferenceScreen::Protocol => "protocol",
            PreferenceScreen::UserInterface => "user_interface",
            PreferenceScreen::Maps => "maps",
            PreferenceScreen::FormManagement => "form_management",
            PreferenceScreen::UserAndDeviceIdentity => "user_and_device_identity",
            PreferenceScreen::Experimental => "experimental",
        }
    }

    /// Admin keys guarding this screen. Empty means admins cannot hide it.
    pub fn admin_keys(&self) -> &'static [AdminKey] {
        match self {
            PreferenceScreen::Protocol => AdminKey::SERVER,
            PreferenceScreen::UserInterface => AdminKey::USER_INTERFACE,
            PreferenceScreen::Maps => AdminKey::MAPS,
            PreferenceScreen::FormManagement => AdminKey::FORM_MANAGEMENT,
            PreferenceScreen::UserAndDeviceIdentity => AdminKey::IDENTITY,
            PreferenceScreen::Experimental => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdminSettings {
    values: BTreeMap<AdminKey, bool>,
}

impl AdminSettings {
    pub fn get(&self, key: AdminKey) -> bool {
        self.values.get(&key).copied().unwrap_or(true)
    }

    pub fn set(&mut self, key: AdminKey, enabled: bool) {
        self.values.insert(key, enabled);
    }

    pub fn any_enabled(&self, keys: &[AdminKey]) -> bool {
        keys.iter().any(|key| self.get(*key))
    }

    /// Screens to list on the general settings screen.
    ///
    /// In admin mode nothing is hidden by admin keys. Outside it, a screen is
    /// listed if at least one of its keys is enabled. The experimental screen
    /// never appears in release builds.
    pub fn visible_screens(&self, admin_mode: bool, is_release: bool) -> Vec<PreferenceScreen> {
        PreferenceScreen::ALL
            .into_iter()
            .filter(|screen| !(is_release && *screen == PreferenceScreen::Experimental))
            .filter(|screen| {
                let keys = screen.admin_keys();
                admin_mode || keys.is_empty() || self.any_enabled(keys)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_disabled(keys: &[AdminKey]) -> AdminSettings {
        let mut settings = AdminSettings::default();
        for key in keys {
            settings.set(*key, false);
        }
        settings
    }

    #[test]
    fn test_unset_keys_are_enabled() {
        let settings = AdminSettings::default();
        assert!(settings.get(AdminKey::Analytics));
        assert_eq!(
            settings.visible_screens(false, false),
            PreferenceScreen::ALL.to_vec()
        );
    }

    #[test]
    fn test_group_hidden_only_when_every_key_disabled() {
        let mut settings = all_disabled(AdminKey::USER_INTERFACE);
        assert!(!settings
            .visible_screens(false, false)
            .contains(&PreferenceScreen::UserInterface));

        settings.set(AdminKey::ChangeFontSize, true);
        assert!(settings
            .visible_screens(false, false)
            .contains(&PreferenceScreen::UserInterface));
    }

    #[test]
    fn test_maps_follows_single_key() {
        let settings = all_disabled(&[AdminKey::Maps]);
        let screens = settings.visible_screens(false, false);
        assert!(!screens.contains(&PreferenceScreen::Maps));
        assert!(screens.contains(&PreferenceScreen::Protocol));
    }

    #[test]
    fn test_admin_mode_ignores_disabled_keys() {
        let mut keys = Vec::new();
        keys.extend_from_slice(AdminKey::SERVER);
        keys.extend_from_slice(AdminKey::FORM_MANAGEMENT);
        keys.extend_from_slice(AdminKey::IDENTITY);
        let settings = all_disabled(&keys);

        assert_eq!(
            settings.visible_screens(true, false),
            PreferenceScreen::ALL.to_vec()
        );
        assert_eq!(
            settings.visible_screens(false, false),
            vec![
                PreferenceScreen::UserInterface,
                PreferenceScreen::Maps,
                PreferenceScreen::Experimental,
            ]
        );
    }

    #[test]
    fn test_release_builds_hide_experimental() {
        let settings = AdminSettings::default();
        assert!(!settings
            .visible_screens(true, true)
            .contains(&PreferenceScreen::Experimental));
        assert!(!settings
            .visible_screens(false, true)
            .contains(&PreferenceScreen::Experimental));
    }

    #[test]
    fn test_serializes_with_snake_case_keys() {
        let settings = all_disabled(&[AdminKey::ChangeServer]);
        let json = serde_json::to_string(&settings).unwrap();
        assert_eq!(json, r#"{"change_server":false}"#);
    }
}
