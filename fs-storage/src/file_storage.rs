use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use crate::base_storage::BaseStorage;
use data_error::{ProfileError, Result};
use fs_atomic_light::temp_and_move;

/*
Note on `FileStorage` format:

The file holds one JSON array with every record, pretty-printed with
two-space indentation so it stays easy to edit by hand. There is no
version header; the array is the whole document.
*/

/// Persists a collection of records as a single JSON file.
pub struct FileStorage<R> {
    label: String,
    path: PathBuf,
    _marker: PhantomData<fn() -> R>,
}

impl<R> FileStorage<R>
where
    R: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Create a new file storage with a diagnostic label and file path
    pub fn new(label: String, path: &Path) -> Self {
        Self {
            label,
            path: PathBuf::from(path),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn storage_error(&self, reason: impl ToString) -> ProfileError {
        ProfileError::Storage(self.label.clone(), reason.to_string())
    }
}

impl<R> BaseStorage<R> for FileStorage<R>
where
    R: serde::Serialize + serde::de::DeserializeOwned,
{
    /// Read every record from the storage file
    fn load_all(&self) -> Result<Vec<R>> {
        if !self.path.exists() {
            return Err(self.storage_error("File does not exist"));
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|err| self.storage_error(err))?;
        let records: Vec<R> = serde_json::from_str(&content)
            .map_err(|err| self.storage_error(err))?;

        log::debug!("{} {} entries have been read", self.label, records.len());
        Ok(records)
    }

    /// Write every record to the storage file, replacing it atomically
    fn save_all(&self, records: &[R]) -> Result<()> {
        let parent_dir = self
            .path
            .parent()
            .ok_or_else(|| self.storage_error("Failed to get parent directory"))?;
        let filename = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| self.storage_error("Invalid file name"))?;

        let value_data = serde_json::to_vec_pretty(records)
            .map_err(|err| self.storage_error(err))?;
        temp_and_move(&value_data, parent_dir, filename)
            .map_err(|err| self.storage_error(err))?;

        log::info!("{} {} entries have been written", self.label, records.len());
        Ok(())
    }
}
