use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::SolsplitConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["solsplit.toml", "config/solsplit.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to render config template: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("config already exists at {0}")]
    Exists(PathBuf),
    #[error("invalid wallet key: {0}")]
    Wallet(String),
}

pub fn load_config(path: Option<PathBuf>) -> Result<SolsplitConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(SolsplitConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<SolsplitConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: SolsplitConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

/// 写出带默认值的配置模板；目标已存在且未指定 `force` 时拒绝覆盖。
pub fn write_template(path: &Path, force: bool) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::Exists(path.to_path_buf()));
    }
    let io_error = |source: std::io::Error| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let rendered = toml::to_string_pretty(&SolsplitConfig::default())?;
    fs::write(path, rendered).map_err(io_error)
}
