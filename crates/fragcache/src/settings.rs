//! Configuracion del cache.
//!
//! Settings are layered with the `config` crate, later sources winning:
//!
//! 1. `fragcache.toml` in the working directory (optional)
//! 2. an explicit file passed by the host (required when given)
//! 3. `FRAGCACHE__*` environment variables (`FRAGCACHE__DIR`, `FRAGCACHE__LOGGING`, ...)
//!
//! ```toml
//! dir = "/var/cache/fragcache"
//! logging = true
//!
//! [[profiles]]
//! name = "Woo"
//! events = ["woo_changed"]
//! ttl_seconds = 2592000
//! logging = true
//!
//! [[profiles]]
//! name = "Footer"
//! events = "acf/save_post, wpcf7_save_contact_form, wp_update_nav_menu"
//! enabled = false
//!
//! [[groups]]
//! name = "woo_changed"
//! events = ["save_post_product", "woocommerce_update_product"]
//! ```
//!
//! Built-in groups are enabled with `presets = ["woocommerce"]`; see
//! [`Preset`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use fragcache_store::fragcache_core::{CacheError, EventName, Profile, parse_event_list};
use fragcache_store::{DEFAULT_EXTENSION, FsStorage, StoreError};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::controller::{Controller, ControllerBuilder};
use crate::presets::Preset;

/// Base name of the optional settings file in the working directory.
pub const DEFAULT_CONFIG_BASENAME: &str = "fragcache";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "FRAGCACHE";

/// File name of the statistics report inside the cache directory.
pub const STATS_FILE: &str = "Stats.txt";

/// Errors while loading settings or building a controller from them.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid profile: {0}")]
    Profile(#[from] CacheError),
    #[error("invalid storage settings: {0}")]
    Storage(#[from] StoreError),
}

/// A list of event names, written either as an array or as one
/// comma-separated string.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EventList {
    Csv(String),
    List(Vec<String>),
}

impl EventList {
    /// Returns the trimmed, non-empty event names.
    pub fn names(&self) -> Vec<EventName> {
        match self {
            Self::Csv(list) => parse_event_list(list),
            Self::List(items) => items
                .iter()
                .map(|e| e.trim())
                .filter(|e| !e.is_empty())
                .map(EventName::from)
                .collect(),
        }
    }
}

impl Default for EventList {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

/// One `[[profiles]]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileSettings {
    pub name: String,
    pub events: EventList,
    pub ttl_seconds: u64,
    pub enabled: bool,
    pub logging: bool,
    pub collapse_misses: bool,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            events: EventList::default(),
            ttl_seconds: 86_400,
            enabled: true,
            logging: false,
            collapse_misses: false,
        }
    }
}

impl ProfileSettings {
    /// Builds the validated profile.
    pub fn to_profile(&self) -> Result<Profile, CacheError> {
        Profile::builder(self.name.clone())
            .events(self.events.names())
            .ttl(Duration::from_secs(self.ttl_seconds))
            .enabled(self.enabled)
            .logging(self.logging)
            .collapse_misses(self.collapse_misses)
            .build()
    }
}

/// One `[[groups]]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GroupSettings {
    pub name: String,
    pub events: EventList,
}

/// Complete cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root directory of the filesystem store.
    pub dir: PathBuf,
    /// Extension of entry files.
    pub extension: String,
    /// Global enabled switch.
    pub enabled: bool,
    /// Global logging switch.
    pub logging: bool,
    /// Statistics report path; `<dir>/Stats.txt` when unset.
    pub stats_file: Option<PathBuf>,
    pub profiles: Vec<ProfileSettings>,
    pub groups: Vec<GroupSettings>,
    /// Built-in groups to register before `groups`.
    pub presets: Vec<Preset>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("fragcache"),
            extension: DEFAULT_EXTENSION.to_string(),
            enabled: true,
            logging: true,
            stats_file: None,
            profiles: Vec::new(),
            groups: Vec::new(),
            presets: Vec::new(),
        }
    }
}

impl Settings {
    /// Loads settings from the default file, `explicit` and the
    /// environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, LoadError> {
        let mut builder = Config::builder()
            .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false));

        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parses settings from TOML text only.
    pub fn from_toml(text: &str) -> Result<Self, LoadError> {
        Ok(Config::builder()
            .add_source(File::from_str(text, FileFormat::Toml))
            .build()?
            .try_deserialize()?)
    }

    /// Returns where the statistics report lives.
    pub fn stats_path(&self) -> PathBuf {
        self.stats_file
            .clone()
            .unwrap_or_else(|| self.dir.join(STATS_FILE))
    }

    /// Validates every profile without building anything.
    pub fn profiles(&self) -> Result<Vec<Profile>, CacheError> {
        self.profiles.iter().map(ProfileSettings::to_profile).collect()
    }

    /// Returns a controller builder over the filesystem store with the
    /// global switches applied.
    pub fn controller_builder(&self) -> Result<ControllerBuilder, LoadError> {
        let storage = FsStorage::new(&self.dir).with_extension(self.extension.clone())?;

        Ok(Controller::builder(Arc::new(storage))
            .enabled(self.enabled)
            .logging(self.logging))
    }

    /// Registers the configured profiles and groups on `controller`.
    pub fn apply(&self, controller: &Controller) -> Result<(), LoadError> {
        for profile in self.profiles()? {
            controller.register_profile(profile);
        }
        for preset in &self.presets {
            controller.register_preset(*preset);
        }
        for group in &self.groups {
            controller.register_group(group.name.as_str(), group.events.names());
        }

        info!(
            dir = %self.dir.display(),
            profiles = self.profiles.len(),
            groups = self.groups.len(),
            presets = self.presets.len(),
            "Cache settings applied"
        );
        Ok(())
    }

    /// Builds a controller with default collaborators and applies the
    /// settings to it.
    pub fn build_controller(&self) -> Result<Controller, LoadError> {
        let controller = self.controller_builder()?.build();
        self.apply(&controller)?;
        Ok(controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::from_toml("").unwrap();
        assert_eq!(settings.dir, PathBuf::from("fragcache"));
        assert_eq!(settings.extension, "entry");
        assert!(settings.enabled);
        assert_eq!(settings.stats_path(), PathBuf::from("fragcache/Stats.txt"));
    }

    #[test]
    fn test_profile_defaults() {
        let settings = Settings::from_toml("[[profiles]]\nname = \"Album\"\n").unwrap();
        let profile = settings.profiles().unwrap().remove(0);

        assert_eq!(profile.ttl(), Duration::from_secs(86_400));
        assert!(profile.is_enabled());
        assert!(!profile.is_logging_enabled());
        assert!(profile.invalidating_events().is_empty());
    }

    #[test]
    fn test_event_list_forms() {
        let csv = EventList::Csv(" a, ,b ".to_string());
        let list = EventList::List(vec!["a".to_string(), " ".to_string(), "b".to_string()]);

        assert_eq!(csv.names(), list.names());
        assert_eq!(csv.names().len(), 2);
    }

    #[test]
    fn test_invalid_profile_name() {
        let settings = Settings::from_toml("[[profiles]]\nname = \"../etc\"\n").unwrap();
        assert!(settings.profiles().is_err());
    }

    #[test]
    fn test_presets() {
        let settings = Settings::from_toml("presets = [\"woocommerce\"]\n").unwrap();
        assert_eq!(settings.presets, vec![Preset::WooCommerce]);

        assert!(Settings::from_toml("presets = [\"magento\"]\n").is_err());
    }

    #[test]
    fn test_bad_extension() {
        let settings = Settings::from_toml("extension = \"tag\"\n").unwrap();
        assert!(matches!(
            settings.controller_builder(),
            Err(LoadError::Storage(_))
        ));
    }
}
