//! Persisted `getUpdates` offset.

use std::path::{Path, PathBuf};

use crate::error::Result;

/// A single decimal integer in a file: the id of the next unseen update.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored offset. Missing, unreadable or garbled files yield 0.
    pub fn load(&self) -> i64 {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("No offset at {} ({}), starting from 0", self.path.display(), e);
                return 0;
            }
        };
        match raw.trim().parse::<i64>() {
            Ok(offset) if offset >= 0 => offset,
            _ => {
                tracing::warn!(
                    "Ignoring unparsable offset {:?} in {}",
                    raw.trim(),
                    self.path.display()
                );
                0
            }
        }
    }

    /// Replace the stored offset.
    ///
    /// Writes a sibling temp file and renames it over the old one, so a crash
    /// leaves either the previous value or the new one.
    pub fn save(&self, offset: i64) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "offset".into());
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        {
            use std::io::Write;
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(offset.to_string().as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
