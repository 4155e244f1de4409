use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use zip::ZipArchive;

use crate::error::CatalogError;

/// Reads every entry of the archive and returns the number of files in it.
pub fn validate_zip(zip_path: &Path) -> Result<usize, CatalogError> {
    let file = fs::File::open(zip_path).map_err(|err| {
        CatalogError::Filesystem(format!("open zip {}: {err}", zip_path.display()))
    })?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| CatalogError::InvalidArchive(err.to_string()))?;

    let mut files = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| CatalogError::InvalidArchive(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        io::copy(&mut entry, &mut io::sink())
            .map_err(|err| CatalogError::InvalidArchive(err.to_string()))?;
        files += 1;
    }
    Ok(files)
}

/// Temp file placed next to its final destination so the rename stays on one
/// filesystem.
pub fn staging_file(dest_dir: &Path, prefix: &str) -> Result<NamedTempFile, CatalogError> {
    fs::create_dir_all(dest_dir).map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    Builder::new()
        .prefix(prefix)
        .suffix(".part")
        .tempfile_in(dest_dir)
        .map_err(|err| CatalogError::Filesystem(err.to_string()))
}

pub fn persist(temp: NamedTempFile, target: &Path) -> Result<PathBuf, CatalogError> {
    temp.persist(target)
        .map_err(|err| CatalogError::Filesystem(err.to_string()))?;
    Ok(target.to_path_buf())
}

pub fn require_file(path: &Path) -> Result<(), CatalogError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CatalogError::MissingFile(path.to_path_buf()))
    }
}
