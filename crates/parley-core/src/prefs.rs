//! Persisted user preferences.
//!
//! Only the theme survives between runs. It is read once at startup and
//! written back whenever it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::ThemeVariant;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub theme: Option<ThemeVariant>,
}

impl Preferences {
    /// Read preferences, treating a missing or unreadable file as empty.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No stored preferences");
                return Self::default();
            }
        };
        match toml::from_str(&content) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring malformed preferences");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Preferences saved");
        Ok(())
    }

    /// The stored theme, or `fallback` when none was persisted.
    pub fn theme_or(&self, fallback: ThemeVariant) -> ThemeVariant {
        self.theme.unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load(&dir.path().join("prefs.toml"));
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.theme_or(ThemeVariant::Dark), ThemeVariant::Dark);
    }

    #[test]
    fn test_theme_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");

        let prefs = Preferences {
            theme: Some(ThemeVariant::Dark),
        };
        prefs.save(&path).unwrap();

        let loaded = Preferences::load(&path);
        assert_eq!(loaded.theme, Some(ThemeVariant::Dark));
        assert_eq!(loaded.theme_or(ThemeVariant::Light), ThemeVariant::Dark);
    }

    #[test]
    fn test_malformed_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(&path, "theme = 7").unwrap();
        assert_eq!(Preferences::load(&path).theme, None);
    }
}
