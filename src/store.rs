use std::fs;
use std::io::{BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::{Builder, TempDir};

use crate::catalog::CatalogFile;
use crate::error::QuakeError;

const RAW_RESPONSE_FILE: &str = "response.tmp";
const TABLE_FILE: &str = "table.tmp";

/// Where catalogs and provider scratch files live on disk.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    scratch_root: Option<Utf8PathBuf>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scratch directories are created under `root` instead of the system
    /// temp directory.
    pub fn with_scratch_root(root: Utf8PathBuf) -> Self {
        Self {
            scratch_root: Some(root),
        }
    }

    /// Removes a catalog left over from an earlier run. Returns whether a
    /// file was removed.
    pub fn remove_existing(&self, path: &Utf8Path) -> Result<bool, QuakeError> {
        if !path.as_std_path().exists() {
            return Ok(false);
        }
        fs::remove_file(path.as_std_path())
            .map_err(|err| QuakeError::Filesystem(format!("remove {path}: {err}")))?;
        Ok(true)
    }

    /// Writes through a temporary file in the destination directory, so a
    /// failed write never leaves a partial catalog behind.
    pub fn write_catalog(&self, path: &Utf8Path, catalog: &CatalogFile) -> Result<(), QuakeError> {
        let parent = parent_dir(path);
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| QuakeError::Filesystem(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix(".eqfinder-catalog")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| QuakeError::Filesystem(err.to_string()))?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            catalog
                .write_to(&mut writer)
                .and_then(|_| writer.flush())
                .map_err(|err| QuakeError::Filesystem(format!("write {path}: {err}")))?;
        }
        self.remove_existing(path)?;
        temp.persist(path.as_std_path())
            .map_err(|err| QuakeError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn scratch(&self) -> Result<ScratchSpace, QuakeError> {
        let builder = {
            let mut builder = Builder::new();
            builder.prefix("eqfinder-isc");
            builder
        };
        let dir = match &self.scratch_root {
            Some(root) => {
                fs::create_dir_all(root.as_std_path())
                    .map_err(|err| QuakeError::Filesystem(err.to_string()))?;
                builder.tempdir_in(root.as_std_path())
            }
            None => builder.tempdir(),
        }
        .map_err(|err| QuakeError::Filesystem(err.to_string()))?;
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf())
            .map_err(|_| QuakeError::Filesystem("invalid scratch dir".to_string()))?;
        Ok(ScratchSpace { _dir: dir, root })
    }
}

/// Per-fetch scratch directory; removed with everything in it on drop.
#[derive(Debug)]
pub struct ScratchSpace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl ScratchSpace {
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn raw_response_path(&self) -> Utf8PathBuf {
        self.root.join(RAW_RESPONSE_FILE)
    }

    pub fn table_path(&self) -> Utf8PathBuf {
        self.root.join(TABLE_FILE)
    }
}

fn parent_dir(path: &Utf8Path) -> &Utf8Path {
    match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_space_removed_on_drop() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let store = CatalogStore::with_scratch_root(root);

        let scratch = store.scratch().unwrap();
        let raw = scratch.raw_response_path();
        fs::write(raw.as_std_path(), b"body").unwrap();
        let dir = scratch.root().to_owned();
        assert!(dir.as_std_path().exists());

        drop(scratch);
        assert!(!dir.as_std_path().exists());
    }

    #[test]
    fn bare_file_name_uses_current_dir() {
        assert_eq!(parent_dir(Utf8Path::new("catalog.txt")), Utf8Path::new("."));
        assert_eq!(parent_dir(Utf8Path::new("out/catalog.txt")), Utf8Path::new("out"));
    }
}
