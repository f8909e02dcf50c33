use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV_VAR: &str = "TABWERK_CONFIG";
pub const DB_PATH_ENV_VAR: &str = "TABWERK_DB_PATH";
pub const DEFAULT_TRASH_RETENTION_DAYS: i64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings file '{path}': {message}")]
    Read { path: String, message: String },
    #[error("Failed to parse settings file '{path}': {message}")]
    Parse { path: String, message: String },
    #[error("Invalid setting '{key}': {message}")]
    Invalid { key: String, message: String },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct CoreSettings {
    pub database_path: PathBuf,
    pub trash_dir_name: String,
    pub trash_retention_days: i64,
    /// Suffix of the sibling directory that holds a repository's worktrees,
    /// e.g. `/code/app` keeps its worktrees under `/code/app-worktrees`.
    pub worktree_dir_suffix: String,
    pub handle_prefix: String,
    pub tmux_binary: String,
    pub git_binary: String,
    pub command_timeout_secs: u64,
    pub default_working_directory: Option<PathBuf>,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            trash_dir_name: ".trash".to_string(),
            trash_retention_days: DEFAULT_TRASH_RETENTION_DAYS,
            worktree_dir_suffix: "-worktrees".to_string(),
            handle_prefix: "tw".to_string(),
            tmux_binary: "tmux".to_string(),
            git_binary: "git".to_string(),
            command_timeout_secs: 30,
            default_working_directory: dirs::home_dir(),
        }
    }
}

pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tabwerk")
        .join("tabwerk.db")
}

impl CoreSettings {
    /// Loads settings from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            log::debug!(
                "Settings file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let settings = Self::from_toml_str(&raw).map_err(|e| match e {
            SettingsError::Parse { message, .. } => SettingsError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(raw).map_err(|e| SettingsError::Parse {
            path: "<inline>".to_string(),
            message: e.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Resolves settings from `TABWERK_CONFIG` (if set) and applies the
    /// `TABWERK_DB_PATH` override on top.
    pub fn from_env() -> Result<Self, SettingsError> {
        let mut settings = match std::env::var_os(CONFIG_ENV_VAR).filter(|v| !v.is_empty()) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(db_path) = std::env::var_os(DB_PATH_ENV_VAR).filter(|v| !v.is_empty()) {
            settings.database_path = PathBuf::from(db_path);
        }

        Ok(settings)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn trash_retention(&self) -> chrono::Duration {
        chrono::Duration::days(self.trash_retention_days)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.trash_retention_days <= 0 {
            return Err(SettingsError::Invalid {
                key: "trash_retention_days".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.trash_dir_name.is_empty()
            || self.trash_dir_name.contains('/')
            || self.trash_dir_name == ".."
        {
            return Err(SettingsError::Invalid {
                key: "trash_dir_name".to_string(),
                message: "must be a single directory name".to_string(),
            });
        }
        if self.command_timeout_secs == 0 {
            return Err(SettingsError::Invalid {
                key: "command_timeout_secs".to_string(),
                message: "must be at least one second".to_string(),
            });
        }
        if self.handle_prefix.is_empty() {
            return Err(SettingsError::Invalid {
                key: "handle_prefix".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().unwrap();
        let settings = CoreSettings::load(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(settings.trash_retention_days, 30);
        assert_eq!(settings.trash_dir_name, ".trash");
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let settings = CoreSettings::from_toml_str(
            r#"
            trash_retention_days = 7
            handle_prefix = "dev"
            "#,
        )
        .unwrap();
        assert_eq!(settings.trash_retention_days, 7);
        assert_eq!(settings.handle_prefix, "dev");
        assert_eq!(settings.tmux_binary, "tmux");
        assert_eq!(settings.trash_retention(), chrono::Duration::days(7));
    }

    #[test]
    fn rejects_nested_trash_dir_name() {
        let err = CoreSettings::from_toml_str("trash_dir_name = \"a/b\"").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid { ref key, .. } if key == "trash_dir_name"));
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.toml");
        std::fs::write(&path, "trash_retention_days = \"soon\"").unwrap();
        let err = CoreSettings::load(&path).unwrap_err();
        match err {
            SettingsError::Parse { path: reported, .. } => {
                assert!(reported.ends_with("settings.toml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
