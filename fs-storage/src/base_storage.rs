use data_error::Result;

/// Whole-collection persistence for a sequence of records.
///
/// There is no indexing and no partial update: callers read every record,
/// change what they need and write every record back.
pub trait BaseStorage<R> {
    /// Scan and load all records
    /// from the pre-configured location.
    fn load_all(&self) -> Result<Vec<R>>;

    /// Replace the persisted collection with `records`.
    ///
    /// Implementations must never expose a partially written collection
    /// to a concurrent `load_all`.
    fn save_all(&self, records: &[R]) -> Result<()>;
}
