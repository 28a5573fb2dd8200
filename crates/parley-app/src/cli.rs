//! CLI argument definitions for the Parley client.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::Parser;
use parley_core::{BehaviorMode, ParleyConfig, Preferences, ThemeVariant};

/// Parley: ask questions about your data and get charts back.
#[derive(Parser, Debug, Default)]
#[command(name = "parley", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the answering service.
    #[arg(short = 'e', long = "endpoint")]
    pub endpoint: Option<String>,

    /// Behavior mode (balanced, short, detailed, structured).
    #[arg(short = 'm', long = "mode")]
    pub mode: Option<BehaviorMode>,

    /// Presentation theme (light or dark).
    #[arg(short = 't', long = "theme")]
    pub theme: Option<ThemeVariant>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Run a single turn with this prompt, print the transcript and exit.
    #[arg(short = 'p', long = "prompt")]
    pub prompt: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PARLEY_CONFIG env var > ~/.parley/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("PARLEY_CONFIG") {
            return PathBuf::from(p);
        }
        parley_dir().join("config.toml")
    }

    /// Resolve the answering service base URL.
    ///
    /// Priority: --endpoint flag > PARLEY_ENDPOINT env var > config file value.
    pub fn resolve_endpoint(&self, config_url: &str) -> String {
        if let Some(ref url) = self.endpoint {
            return url.clone();
        }
        match std::env::var("PARLEY_ENDPOINT") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => config_url.to_string(),
        }
    }

    /// Resolve the behavior mode.
    ///
    /// Priority: --mode flag > PARLEY_MODE env var > config file value.
    pub fn resolve_mode(&self, config_mode: BehaviorMode) -> BehaviorMode {
        if let Some(mode) = self.mode {
            return mode;
        }
        std::env::var("PARLEY_MODE")
            .ok()
            .and_then(|m| m.parse().ok())
            .unwrap_or(config_mode)
    }

    /// Resolve the theme.
    ///
    /// Priority: --theme flag > persisted preference > config file value.
    pub fn resolve_theme(&self, prefs: &Preferences, config_theme: ThemeVariant) -> ThemeVariant {
        self.theme.unwrap_or_else(|| prefs.theme_or(config_theme))
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }

    /// Apply every override that lands in the configuration itself.
    pub fn apply(&self, config: &mut ParleyConfig) {
        config.service.base_url = self.resolve_endpoint(&config.service.base_url);
        config.chat.behavior_mode = self.resolve_mode(config.chat.behavior_mode);
        config.general.log_level = self.resolve_log_level(&config.general.log_level);
    }
}

/// Per-user directory holding config and preferences.
fn parley_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".parley");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".parley");
    }
    PathBuf::from(".parley")
}

/// Location of the persisted preferences file.
pub fn prefs_path() -> PathBuf {
    parley_dir().join("prefs.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_flags() {
        let args = CliArgs::try_parse_from([
            "parley",
            "--config",
            "/tmp/p.toml",
            "--endpoint",
            "http://10.0.0.2:8000",
            "--mode",
            "detailed",
            "--theme",
            "dark",
            "--log-level",
            "debug",
            "--prompt",
            "Show revenue",
        ])
        .unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/tmp/p.toml"));
        assert_eq!(args.mode, Some(BehaviorMode::Detailed));
        assert_eq!(args.theme, Some(ThemeVariant::Dark));
        assert_eq!(args.prompt.as_deref(), Some("Show revenue"));
        assert_eq!(args.resolve_endpoint("http://localhost:8000"), "http://10.0.0.2:8000");
    }

    #[test]
    fn test_invalid_mode_rejected() {
        assert!(CliArgs::try_parse_from(["parley", "--mode", "chatty"]).is_err());
        assert!(CliArgs::try_parse_from(["parley", "--theme", "sepia"]).is_err());
    }

    #[test]
    fn test_flag_overrides_config() {
        let args = CliArgs {
            mode: Some(BehaviorMode::Short),
            log_level: Some("trace".into()),
            endpoint: Some("http://example.com".into()),
            ..CliArgs::default()
        };
        let mut config = ParleyConfig::default();
        args.apply(&mut config);
        assert_eq!(config.chat.behavior_mode, BehaviorMode::Short);
        assert_eq!(config.general.log_level, "trace");
        assert_eq!(config.service.base_url, "http://example.com");
    }

    #[test]
    fn test_theme_resolution_order() {
        let stored = Preferences {
            theme: Some(ThemeVariant::Dark),
        };
        let none = CliArgs::default();
        assert_eq!(
            none.resolve_theme(&Preferences::default(), ThemeVariant::Light),
            ThemeVariant::Light
        );
        assert_eq!(none.resolve_theme(&stored, ThemeVariant::Light), ThemeVariant::Dark);

        let flag = CliArgs {
            theme: Some(ThemeVariant::Light),
            ..CliArgs::default()
        };
        assert_eq!(flag.resolve_theme(&stored, ThemeVariant::Dark), ThemeVariant::Light);
    }

    #[test]
    fn test_log_level_falls_back_to_config() {
        assert_eq!(CliArgs::default().resolve_log_level("warn"), "warn");
    }
}
