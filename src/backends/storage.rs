// Durable single-value slot for the registration token
// Writes go to a temp file in the same directory and are renamed into place,
// so a crash mid-write leaves the previous token intact

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

const TOKEN_FILE_NAME: &str = "native_push_token.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredToken {
    token: String,
    updated_at: DateTime<Utc>,
}

/// File-backed token slot, one per installation
#[derive(Debug, Clone)]
pub struct FileTokenSlot {
    path: PathBuf,
}

impl FileTokenSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Slot at the conventional file name inside an app data directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(TOKEN_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the stored token
    pub fn write(&self, token: &str) -> io::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let stored = StoredToken {
            token: token.to_string(),
            updated_at: Utc::now(),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut temp, &stored)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Stored token, `None` when nothing was ever written
    pub fn read(&self) -> io::Result<Option<String>> {
        Ok(self.read_stored()?.map(|stored| stored.token))
    }

    /// When the token was last replaced
    pub fn updated_at(&self) -> io::Result<Option<DateTime<Utc>>> {
        Ok(self.read_stored()?.map(|stored| stored.updated_at))
    }

    /// Forget the token, e.g. on sign-out
    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    fn read_stored(&self) -> io::Result<Option<StoredToken>> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}
