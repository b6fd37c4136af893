use crate::Result;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test fixture for a SQLite database file inside a temporary directory.
///
/// The directory and everything in it is removed when the fixture is dropped.
pub struct SqliteFile {
    _dir: TempDir,
    path: PathBuf,
}

impl SqliteFile {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tally.db");
        Ok(Self { _dir: dir, path })
    }

    /// Path of the database file. The file itself is created on first connect.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.path.display())
    }
}
