use std::marker::PhantomData;
use std::sync::Mutex;

use crate::base_storage::BaseStorage;
use data_error::{ProfileError, Result};

/// Keeps the collection in process memory.
pub struct MemoryStorage<R> {
    label: String,
    records: Mutex<Option<Vec<R>>>,
    _marker: PhantomData<fn() -> R>,
}

impl<R: Clone> MemoryStorage<R> {
    pub fn new(label: impl Into<String>, records: Vec<R>) -> Self {
        Self {
            label: label.into(),
            records: Mutex::new(Some(records)),
            _marker: PhantomData,
        }
    }

    /// A store whose backing collection does not exist,
    /// behaving like a missing storage file.
    pub fn missing(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            records: Mutex::new(None),
            _marker: PhantomData,
        }
    }

    fn poisoned(&self) -> ProfileError {
        ProfileError::Storage(self.label.clone(), "Lock poisoned".to_owned())
    }
}

impl<R: Clone> BaseStorage<R> for MemoryStorage<R> {
    fn load_all(&self) -> Result<Vec<R>> {
        let guard = self.records.lock().map_err(|_| self.poisoned())?;
        guard.clone().ok_or_else(|| {
            ProfileError::Storage(
                self.label.clone(),
                "Collection does not exist".to_owned(),
            )
        })
    }

    fn save_all(&self, records: &[R]) -> Result<()> {
        let mut guard = self.records.lock().map_err(|_| self.poisoned())?;
        *guard = Some(records.to_vec());
        log::debug!("{} {} entries have been stored", self.label, records.len());
        Ok(())
    }
}
