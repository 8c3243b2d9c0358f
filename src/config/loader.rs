use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::AppConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["poolside.toml", "config/poolside.toml"];

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
    #[error("配置缺失或非法: {0}")]
    Invalid(String),
}

pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let explicit = path.is_some();
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            config.validate()?;
            return Ok(config);
        }
        if explicit {
            return Err(ConfigError::Io {
                path: candidate,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
            });
        }
    }

    Ok(AppConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_is_loaded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("poolside.toml");
        fs::write(&path, "[network]\nchain_id = 1\nrpc_url = \"http://127.0.0.1:9545\"\n")
            .expect("write config");

        let config = load_config(Some(path)).expect("load");
        assert_eq!(config.network.chain_id, 1);
        assert_eq!(config.network.chain_name, "Anvil Local");
    }

    #[test]
    fn missing_explicit_path_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = load_config(Some(dir.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[network\nchain_id = ").expect("write config");
        assert!(matches!(
            load_config(Some(path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn invalid_rpc_url_fails_validation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("poolside.toml");
        fs::write(&path, "[network]\nrpc_url = \"not a url\"\n").expect("write config");
        assert!(matches!(
            load_config(Some(path)),
            Err(ConfigError::Invalid(_))
        ));
    }
}
