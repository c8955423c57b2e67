//! Fixture resolution.
//!
//! Fixtures are static files named by scenario steps and resolved against a
//! single directory. Handles returned by [`FixtureStore::open`] are owned by the
//! caller and released when dropped.

use crate::errors::{HarnessError, HarnessResult};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How a fixture's content is read into the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Content must be valid UTF-8.
    #[default]
    Text,
    /// Content is taken byte for byte.
    Binary,
}

impl FromStr for ReadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "r" => Ok(Self::Text),
            "binary" | "rb" => Ok(Self::Binary),
            other => Err(format!("unknown read mode {other:?}, expected text or binary")),
        }
    }
}

/// An opened fixture together with its size on disk.
#[derive(Debug)]
pub struct OpenFixture {
    pub name: String,
    pub file: File,
    pub len: u64,
}

#[derive(Debug, Clone)]
pub struct FixtureStore {
    root: PathBuf,
}

impl FixtureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves `name` to an existing file.
    ///
    /// # Errors
    ///
    /// [`HarnessError::FixtureNotFound`] when nothing is there.
    pub fn resolve(&self, name: &str) -> HarnessResult<PathBuf> {
        let candidate = self.root.join(name);
        if candidate.is_file() {
            Ok(candidate)
        } else {
            Err(HarnessError::FixtureNotFound(candidate))
        }
    }

    /// Opens a fixture for streaming.
    ///
    /// # Errors
    ///
    /// [`HarnessError::FixtureNotFound`] or the underlying I/O error.
    pub fn open(&self, name: &str) -> HarnessResult<OpenFixture> {
        let path = self.resolve(name)?;
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        tracing::debug!("Opened fixture {} ({len} bytes)", path.display());
        Ok(OpenFixture {
            name: file_name_of(name),
            file,
            len,
        })
    }

    /// Reads a fixture fully.
    ///
    /// # Errors
    ///
    /// [`HarnessError::FixtureNotFound`], [`HarnessError::InvalidText`] for
    /// non UTF-8 content in text mode, or the underlying I/O error.
    pub fn read(&self, name: &str, mode: ReadMode) -> HarnessResult<Vec<u8>> {
        let path = self.resolve(name)?;
        let content = std::fs::read(&path)?;
        if mode == ReadMode::Text && std::str::from_utf8(&content).is_err() {
            return Err(HarnessError::InvalidText(path));
        }
        Ok(content)
    }
}

/// The last path segment, as sent in a multipart `filename` parameter.
fn file_name_of(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map_or_else(|| name.to_string(), |n| n.to_string_lossy().into_owned())
}
