use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Fully resolved configuration for one run. Built-in defaults, then the
/// optional defaults file, then the command line, in increasing precedence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunConfig {
    pub samples: u32,
    pub tdelay_secs: u64,
    pub show_system: bool,
    pub show_users: bool,
    pub sequential: bool,
    pub graphs: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            samples: 10,
            tdelay_secs: 1,
            show_system: true,
            show_users: true,
            sequential: false,
            graphs: false,
        }
    }
}

impl RunConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.tdelay_secs)
    }
}

/// On-disk defaults file (`config_dir()/sysglance/config.toml`).
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub samples: u32,
    pub tdelay_secs: u64,
    pub sequential: bool,
    pub graphics: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        DefaultsConfig {
            samples: 10,
            tdelay_secs: 1,
            sequential: false,
            graphics: false,
        }
    }
}

impl FileConfig {
    pub fn into_run_config(self) -> RunConfig {
        RunConfig {
            samples: self.defaults.samples.max(1),
            tdelay_secs: self.defaults.tdelay_secs,
            sequential: self.defaults.sequential,
            graphs: self.defaults.graphics,
            ..RunConfig::default()
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sysglance").join("config.toml"))
}

pub fn load_config() -> FileConfig {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => FileConfig::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> FileConfig {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => FileConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_run_config_values() {
        let config = RunConfig::default();
        assert_eq!(config.samples, 10);
        assert_eq!(config.tdelay_secs, 1);
        assert!(config.show_system);
        assert!(config.show_users);
        assert!(!config.sequential);
        assert!(!config.graphs);
    }

    #[test]
    fn parse_partial_toml() {
        let toml_str = r#"
[defaults]
samples = 5
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.defaults.samples, 5);
        // Other fields should be defaults
        assert_eq!(config.defaults.tdelay_secs, 1);
        assert!(!config.defaults.graphics);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
[defaults]
samples = 20
tdelay_secs = 2
sequential = true
graphics = true
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        let run = config.into_run_config();
        assert_eq!(run.samples, 20);
        assert_eq!(run.tdelay_secs, 2);
        assert!(run.sequential);
        assert!(run.graphs);
        // the file cannot restrict sections; only the CLI can
        assert!(run.show_system && run.show_users);
    }

    #[test]
    fn zero_samples_in_file_is_floored_to_one() {
        let config: FileConfig = toml::from_str("[defaults]\nsamples = 0\n").unwrap();
        assert_eq!(config.into_run_config().samples, 1);
    }

    #[test]
    fn missing_file_returns_default() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.toml"));
        assert_eq!(config.defaults.samples, 10);
    }

    #[test]
    fn invalid_toml_returns_default() {
        let temp = std::env::temp_dir().join("sysglance_test_invalid.toml");
        std::fs::write(&temp, "this is not valid toml {{{{").unwrap();
        let config = load_config_from_path(&temp);
        assert_eq!(config.defaults.tdelay_secs, 1);
        let _ = std::fs::remove_file(&temp);
    }

    #[test]
    fn delay_converts_to_duration() {
        let config = RunConfig {
            tdelay_secs: 3,
            ..RunConfig::default()
        };
        assert_eq!(config.delay(), Duration::from_secs(3));
    }
}
