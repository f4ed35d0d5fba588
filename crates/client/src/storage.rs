//! Durable client-local storage.
//!
//! Values are stored as one JSON file per key under a data directory. The
//! default directory is platform-specific:
//!   - Linux: `~/.config/chatify/`
//!   - macOS: `~/Library/Application Support/chatify/`
//!   - Windows: `%APPDATA%\chatify\`

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

/// Key/value store backed by JSON files.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: Option<PathBuf>,
}

impl Storage {
    /// Storage rooted at `dir`. The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Storage in the platform config directory, or a storage that never
    /// persists anything when no such directory exists.
    pub fn platform_default() -> Self {
        Self {
            dir: default_dir(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Save a value to persistent storage.
    ///
    /// Returns `true` if the operation succeeded.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.save_raw(key, &json),
            Err(_) => false,
        }
    }

    /// Load a value from persistent storage.
    ///
    /// Returns `None` if the key doesn't exist or deserialization fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.load_raw(key)?;
        serde_json::from_str(&json).ok()
    }

    /// Remove a value from persistent storage.
    pub fn remove(&self, key: &str) {
        if let Some(path) = self.file_path(key) {
            let _ = std::fs::remove_file(path);
        }
    }

    fn file_path(&self, key: &str) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        Some(dir.join(format!("{}.json", safe_key)))
    }

    fn save_raw(&self, key: &str, value: &str) -> bool {
        let Some(path) = self.file_path(key) else {
            return false;
        };
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        std::fs::write(path, value).is_ok()
    }

    fn load_raw(&self, key: &str) -> Option<String> {
        let path = self.file_path(key)?;
        std::fs::read_to_string(path).ok()
    }
}

/// Platform config directory joined with `chatify`.
pub fn default_dir() -> Option<PathBuf> {
    Some(dirs::config_dir()?.join("chatify"))
}
