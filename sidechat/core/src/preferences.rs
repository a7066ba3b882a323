//! User Preferences
//!
//! Theme and language preferences edited from the settings surface. Values
//! are read and written synchronously as a small TOML file at
//! `$XDG_CONFIG_HOME/sidechat/preferences.toml`:
//!
//! ```toml
//! theme = "dark"
//! lang = "vi"
//! ```
//!
//! Missing keys fall back to their defaults (`system`, `en`); unknown values
//! are rejected rather than silently replaced.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the preferences store
#[derive(Debug, Error)]
pub enum PreferencesError {
    /// File could not be read or written
    #[error("preferences file {path}: {source}")]
    Io {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// File contents are not valid preferences
    #[error("failed to parse preferences: {0}")]
    Parse(#[from] toml::de::Error),

    /// Preferences could not be encoded
    #[error("failed to encode preferences: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Key is not a known preference
    #[error("unknown preference '{0}' (expected theme or lang)")]
    UnknownKey(String),

    /// Value is not allowed for the key
    #[error("invalid value '{value}' for {key} (expected one of: {expected})")]
    InvalidValue {
        /// Preference key
        key: &'static str,
        /// Rejected value
        value: String,
        /// Allowed values
        expected: &'static str,
    },
}

/// Color theme
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Light colors
    Light,
    /// Dark colors
    Dark,
    /// Follow the operating system
    #[default]
    System,
}

impl Theme {
    /// All themes, in picker order
    pub const ALL: [Self; 3] = [Self::System, Self::Dark, Self::Light];

    /// Stored value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Dark => "Dark",
            Self::System => "System",
        }
    }
}

impl FromStr for Theme {
    type Err = PreferencesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            _ => Err(PreferencesError::InvalidValue {
                key: "theme",
                value: s.to_string(),
                expected: "light, dark, system",
            }),
        }
    }
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interface language
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// English
    #[default]
    En,
    /// Vietnamese
    Vi,
}

impl Lang {
    /// All languages, in picker order
    pub const ALL: [Self; 2] = [Self::En, Self::Vi];

    /// Stored value
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Vi => "vi",
        }
    }

    /// Human-readable label
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Vi => "Vietnamese",
        }
    }
}

impl FromStr for Lang {
    type Err = PreferencesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Self::En),
            "vi" => Ok(Self::Vi),
            _ => Err(PreferencesError::InvalidValue {
                key: "lang",
                value: s.to_string(),
                expected: "en, vi",
            }),
        }
    }
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full set of preferences
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Color theme
    pub theme: Theme,
    /// Interface language
    pub lang: Lang,
}

impl Preferences {
    /// Read one preference by key
    ///
    /// # Errors
    ///
    /// Returns [`PreferencesError::UnknownKey`] for anything but `theme`/`lang`.
    pub fn get(&self, key: &str) -> Result<String, PreferencesError> {
        match key {
            "theme" => Ok(self.theme.to_string()),
            "lang" => Ok(self.lang.to_string()),
            other => Err(PreferencesError::UnknownKey(other.to_string())),
        }
    }

    /// Set one preference by key, validating the value
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys or values outside the allowed set.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), PreferencesError> {
        match key {
            "theme" => self.theme = value.parse()?,
            "lang" => self.lang = value.parse()?,
            other => return Err(PreferencesError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

/// File-backed preferences store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreferencesStore {
    path: PathBuf,
}

impl PreferencesStore {
    /// Use the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default preferences location, if a config directory is known
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("sidechat").join("preferences.toml"))
    }

    /// Path of the file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read preferences; a missing file yields the defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Preferences, PreferencesError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(toml::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(source) => Err(PreferencesError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Write preferences
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        let raw = toml::to_string(preferences)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| PreferencesError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        std::fs::write(&self.path, raw).map_err(|source| PreferencesError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Read one stored preference by key
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys or an unreadable file.
    pub fn get(&self, key: &str) -> Result<String, PreferencesError> {
        self.load()?.get(key)
    }

    /// Validate and persist one preference, returning the updated set
    ///
    /// # Errors
    ///
    /// Returns an error for invalid keys or values, or if the file cannot
    /// be read or written. Nothing is written when validation fails.
    pub fn set(&self, key: &str, value: &str) -> Result<Preferences, PreferencesError> {
        let mut preferences = self.load()?;
        preferences.set(key, value)?;
        self.save(&preferences)?;

        tracing::info!(key, value, path = %self.path.display(), "Preferences updated");
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let prefs = Preferences::default();
        assert_eq!(prefs.theme, Theme::System);
        assert_eq!(prefs.lang, Lang::En);
    }

    #[test]
    fn test_parse_values() {
        assert_eq!("Dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert_eq!(" vi ".parse::<Lang>().unwrap(), Lang::Vi);
        assert!(matches!(
            "sepia".parse::<Theme>(),
            Err(PreferencesError::InvalidValue { key: "theme", .. })
        ));
        assert!(matches!(
            "fr".parse::<Lang>(),
            Err(PreferencesError::InvalidValue { key: "lang", .. })
        ));
    }

    #[test]
    fn test_labels() {
        let themes: Vec<_> = Theme::ALL.iter().map(Theme::label).collect();
        assert_eq!(themes, vec!["System", "Dark", "Light"]);
        assert_eq!(Lang::Vi.label(), "Vietnamese");
    }

    #[test]
    fn test_get_and_set_by_key() {
        let mut prefs = Preferences::default();
        prefs.set("theme", "light").unwrap();
        prefs.set("lang", "vi").unwrap();

        assert_eq!(prefs.get("theme").unwrap(), "light");
        assert_eq!(prefs.get("lang").unwrap(), "vi");
        assert!(matches!(
            prefs.set("font", "mono"),
            Err(PreferencesError::UnknownKey(_))
        ));
        assert!(prefs.get("font").is_err());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let store = PreferencesStore::new(dir.path().join("preferences.toml"));

        assert_eq!(store.load().unwrap(), Preferences::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, "lang = \"vi\"\n").unwrap();

        let prefs = PreferencesStore::new(&path).load().unwrap();
        assert_eq!(prefs.theme, Theme::System);
        assert_eq!(prefs.lang, Lang::Vi);
    }

    #[test]
    fn test_unknown_value_in_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.toml");
        std::fs::write(&path, "theme = \"sepia\"\n").unwrap();

        assert!(matches!(
            PreferencesStore::new(&path).load(),
            Err(PreferencesError::Parse(_))
        ));
    }

    #[test]
    fn test_set_persists() {
        let dir = TempDir::new().unwrap();
        let store = PreferencesStore::new(dir.path().join("cfg").join("preferences.toml"));

        let updated = store.set("theme", "dark").unwrap();
        assert_eq!(updated.theme, Theme::Dark);
        assert_eq!(store.get("theme").unwrap(), "dark");
        assert_eq!(store.get("lang").unwrap(), "en");

        assert!(store.set("theme", "sepia").is_err());
        assert_eq!(store.load().unwrap().theme, Theme::Dark);
    }
}
