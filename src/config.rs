use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const CONFIG_FILE: &str = "catalog.json";

/// On-disk shape of `catalog.json`; every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub download_dir: Option<String>,
    #[serde(default)]
    pub storage_dir: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub download_dir: Utf8PathBuf,
    pub storage_dir: Utf8PathBuf,
    /// Bearer token supplied through the environment; takes precedence over a
    /// stored login.
    pub token: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ClientConfig, CatalogError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(CONFIG_FILE),
        };

        let config = if path.is_none() && !config_path.exists() {
            Config::default()
        } else {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| CatalogError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| CatalogError::ConfigParse(err.to_string()))?
        };

        let mut resolved = Self::resolve_config(config)?;
        if let Ok(base_url) = std::env::var("CATALOG_BASE_URL") {
            if !base_url.trim().is_empty() {
                resolved.base_url = normalize_base_url(&base_url);
            }
        }
        if let Ok(token) = std::env::var("CATALOG_TOKEN") {
            if !token.trim().is_empty() {
                resolved.token = Some(token.trim().to_string());
            }
        }
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ClientConfig, CatalogError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(normalize_base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let download_dir = match config.download_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
                Utf8PathBuf::from_path_buf(cwd)
                    .map_err(|_| CatalogError::Filesystem("invalid download path".to_string()))?
            }
        };

        let storage_dir = match config.storage_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_storage_dir()?,
        };

        Ok(ClientConfig {
            base_url,
            timeout_secs: config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            download_dir,
            storage_dir,
            token: None,
        })
    }
}

pub fn default_storage_dir() -> Result<Utf8PathBuf, CatalogError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.data_local_dir().join("heritage-catalog")).ok()
        })
        .ok_or_else(|| CatalogError::Filesystem("unable to resolve data directory".to_string()))
}

fn normalize_base_url(value: &str) -> String {
    value.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_config() {
        let config = Config {
            storage_dir: Some("/tmp/catalog-store".to_string()),
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.base_url, DEFAULT_BASE_URL);
        assert_eq!(resolved.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(resolved.storage_dir.as_str(), "/tmp/catalog-store");
        assert!(resolved.token.is_none());
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = Config {
            base_url: Some("https://catalogo.example.cl/".to_string()),
            storage_dir: Some("/tmp/catalog-store".to_string()),
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.base_url, "https://catalogo.example.cl");
    }
}
