use std::fs;
use std::io::{self, Write};

use camino::Utf8PathBuf;
use tempfile::Builder;

use crate::error::CatalogError;

/// Key under which the download selection is persisted.
pub const SELECTION_KEY: &str = "selectedArtifacts";
/// Key under which the bearer token of a logged-in session is persisted.
pub const TOKEN_KEY: &str = "token";

/// Directory-backed string key/value store, one file per key.
///
/// Writes go through a temp file in the same directory followed by a rename,
/// so a reader never observes a half-written value.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: Utf8PathBuf,
}

impl LocalStorage {
    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn item_path(&self, key: &str) -> Result<Utf8PathBuf, CatalogError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }

    pub fn ensure_root(&self) -> Result<(), CatalogError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| CatalogError::Filesystem(err.to_string()))
    }

    pub fn get_item(&self, key: &str) -> Result<Option<String>, CatalogError> {
        let path = self.item_path(key)?;
        match fs::read_to_string(path.as_std_path()) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CatalogError::Filesystem(format!("read {path}: {err}"))),
        }
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<(), CatalogError> {
        let path = self.item_path(key)?;
        self.ensure_root()?;
        let mut temp = Builder::new()
            .prefix(".catalog-item")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        temp.write_all(value.as_bytes())
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<(), CatalogError> {
        let path = self.item_path(key)?;
        match fs::remove_file(path.as_std_path()) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CatalogError::Filesystem(format!("remove {path}: {err}"))),
        }
    }
}

fn validate_key(key: &str) -> Result<(), CatalogError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
    if !valid {
        return Err(CatalogError::InvalidStorageKey(key.to_string()));
    }
    Ok(())
}
