use data_error::Result;

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Temporary file living next to its destination.
/// Removed on drop unless it has been moved into place.
struct TmpFile {
    path: PathBuf,
    persisted: bool,
}

impl TmpFile {
    fn create_in(dir: &Path, filename: &str) -> Self {
        let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(10)
            .collect();
        let path = dir.join(format!(".{filename}.{suffix}.tmp"));
        Self {
            path,
            persisted: false,
        }
    }
}

impl Drop for TmpFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Write data to a temporary file and move that written file to destination
///
/// The temporary file is created in `dest_dir` so the final rename stays on
/// one filesystem; readers observe either the old or the new content.
pub fn temp_and_move(
    data: &[u8],
    dest_dir: impl AsRef<Path>,
    filename: &str,
) -> Result<()> {
    let dest_dir = dest_dir.as_ref();
    fs::create_dir_all(dest_dir)?;

    let mut tmp = TmpFile::create_in(dest_dir, filename);
    let mut file = File::create(&tmp.path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp.path, dest_dir.join(filename))?;
    tmp.persisted = true;

    Ok(())
}
