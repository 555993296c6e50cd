//! Where the encoded save lives.

use std::sync::{Arc, Mutex};

use super::codec::SaveError;

/// A single save slot.
pub trait SaveStorage: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    fn read(&self) -> Result<Option<String>, SaveError>;
    fn write(&mut self, data: &str) -> Result<(), SaveError>;
    fn clear(&mut self) -> Result<(), SaveError>;
    fn describe(&self) -> String;
}

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    /// JSON file, replaced atomically on every write.
    #[derive(Debug, Clone)]
    pub struct FileStorage {
        path: PathBuf,
    }

    impl FileStorage {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        /// `saves/geomerge.json` next to the executable.
        pub fn beside_executable() -> Self {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.to_path_buf()))
                .unwrap_or_else(|| PathBuf::from("."));
            Self::new(exe_dir.join("saves").join("geomerge.json"))
        }
    }

    impl SaveStorage for FileStorage {
        fn read(&self) -> Result<Option<String>, SaveError> {
            if !self.path.exists() {
                return Ok(None);
            }
            Ok(Some(fs::read_to_string(&self.path)?))
        }

        fn write(&mut self, data: &str) -> Result<(), SaveError> {
            if let Some(dir) = self.path.parent() {
                fs::create_dir_all(dir)?;
            }
            let tmp_path = self.path.with_extension("json.tmp");
            fs::write(&tmp_path, data)?;
            fs::rename(&tmp_path, &self.path)?;
            Ok(())
        }

        fn clear(&mut self) -> Result<(), SaveError> {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            Ok(())
        }

        fn describe(&self) -> String {
            self.path.display().to_string()
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::LocalStorage;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::*;
    use web_sys::Storage;

    /// `window.localStorage`, looked up per call so the backend stays `Send`.
    #[derive(Debug, Clone)]
    pub struct LocalStorage {
        key: String,
    }

    impl LocalStorage {
        pub fn new(key: impl Into<String>) -> Self {
            Self { key: key.into() }
        }

        fn storage() -> Result<Storage, SaveError> {
            web_sys::window()
                .ok_or_else(|| SaveError::Storage("no window".into()))?
                .local_storage()
                .map_err(|e| SaveError::Storage(format!("{e:?}")))?
                .ok_or_else(|| SaveError::Storage("localStorage disabled".into()))
        }
    }

    impl Default for LocalStorage {
        fn default() -> Self {
            Self::new("geomerge-save")
        }
    }

    impl SaveStorage for LocalStorage {
        fn read(&self) -> Result<Option<String>, SaveError> {
            Self::storage()?
                .get_item(&self.key)
                .map_err(|e| SaveError::Storage(format!("{e:?}")))
        }

        fn write(&mut self, data: &str) -> Result<(), SaveError> {
            Self::storage()?
                .set_item(&self.key, data)
                .map_err(|e| SaveError::Storage(format!("{e:?}")))
        }

        fn clear(&mut self) -> Result<(), SaveError> {
            Self::storage()?
                .remove_item(&self.key)
                .map_err(|e| SaveError::Storage(format!("{e:?}")))
        }

        fn describe(&self) -> String {
            format!("localStorage[{}]", self.key)
        }
    }
}

/// Process-local slot. Clones share the same contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn with_contents(data: impl Into<String>) -> Self {
        let storage = Self::default();
        if let Ok(mut slot) = storage.slot.lock() {
            *slot = Some(data.into());
        }
        storage
    }

    /// Every write fails, like a full disk or a quota error.
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<String>>, SaveError> {
        self.slot
            .lock()
            .map_err(|_| SaveError::Storage("memory slot poisoned".into()))
    }
}

impl SaveStorage for MemoryStorage {
    fn read(&self) -> Result<Option<String>, SaveError> {
        Ok(self.lock()?.clone())
    }

    fn write(&mut self, data: &str) -> Result<(), SaveError> {
        if self.fail_writes {
            return Err(SaveError::Storage("write refused".into()));
        }
        *self.lock()? = Some(data.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), SaveError> {
        *self.lock()? = None;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
