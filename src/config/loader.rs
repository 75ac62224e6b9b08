use std::path::Path;

use crate::args::DEFAULT_CONFIG_FILES;
use crate::error::{AppError, AppResult, ConfigError};

use super::types::ConfigFile;

/// First of the well-known config files present in the working directory.
#[must_use]
pub fn default_config_path() -> Option<&'static Path> {
    DEFAULT_CONFIG_FILES
        .into_iter()
        .map(Path::new)
        .find(|candidate| candidate.is_file())
}

/// Reads the config named by `--config`, or else a well-known file from the
/// working directory. `None` means neither exists.
///
/// # Errors
///
/// Returns an error when the chosen file is unreadable or malformed.
pub fn load_config(explicit: Option<&str>) -> AppResult<Option<ConfigFile>> {
    let chosen = match explicit {
        Some(path) => Path::new(path),
        None => match default_config_path() {
            Some(found) => {
                tracing::debug!(path = %found.display(), "Picked up default config");
                found
            }
            None => return Ok(None),
        },
    };
    load_config_file(chosen).map(Some)
}

pub(crate) fn load_config_file(path: &Path) -> AppResult<ConfigFile> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        AppError::config(ConfigError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })
    })?;
    let Some(ext) = path.extension() else {
        return Err(AppError::config(ConfigError::MissingExtension));
    };
    if ext.eq_ignore_ascii_case("toml") {
        return toml::from_str(&text).map_err(|source| {
            AppError::config(ConfigError::ParseToml {
                path: path.to_path_buf(),
                source,
            })
        });
    }
    if ext.eq_ignore_ascii_case("json") {
        return serde_json::from_str(&text).map_err(|source| {
            AppError::config(ConfigError::ParseJson {
                path: path.to_path_buf(),
                source,
            })
        });
    }
    Err(AppError::config(ConfigError::UnsupportedExtension {
        ext: ext.to_string_lossy().into_owned(),
    }))
}
