//! Directory-backed [`GameStorage`]: one JSON file per key.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use univa_game::GameStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key `{0}`")]
    InvalidKey(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Use `root` for save files, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            && !key.starts_with('.');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl GameStorage for FileStorage {
    type Error = StorageError;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io { path, source }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        let path = self.path_for(key)?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)
            .and_then(|()| fs::rename(&staging, &path))
            .map_err(|source| StorageError::Io { path, source })
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Err(err) if err.kind() != ErrorKind::NotFound => {
                Err(StorageError::Io { path, source: err })
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use univa_game::RUN_STORAGE_KEY;

    fn temp_root(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "univa-storage-{label}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn write_read_remove_cycle() {
        let storage = FileStorage::open(temp_root("cycle")).unwrap();
        assert_eq!(storage.read(RUN_STORAGE_KEY).unwrap(), None);
        storage.write(RUN_STORAGE_KEY, "{\"run\":{}}").unwrap();
        assert!(storage.root().join("univa.run.json").exists());
        assert_eq!(
            storage.read(RUN_STORAGE_KEY).unwrap().as_deref(),
            Some("{\"run\":{}}")
        );
        storage.remove(RUN_STORAGE_KEY).unwrap();
        storage.remove(RUN_STORAGE_KEY).unwrap();
        assert_eq!(storage.read(RUN_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn keys_cannot_escape_the_directory() {
        let storage = FileStorage::open(temp_root("escape")).unwrap();
        for key in ["../secrets", "", ".hidden", "a/b"] {
            assert!(matches!(
                storage.write(key, "x"),
                Err(StorageError::InvalidKey(_))
            ));
        }
    }
}
