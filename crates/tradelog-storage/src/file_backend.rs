use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use tempfile::NamedTempFile;
use tracing::{debug, instrument};
use tradelog_core::storage::{StorageBackend, StorageError};

/// Durable backend: one file per key under `<root>/<namespace>/`.
/// Survives restarts; writes are atomic (temp file, then rename).
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl AsRef<Path>, namespace: &str) -> Self {
        let dir = root.as_ref().join(sanitize_key(namespace));
        debug!(?dir, "file backend namespace");
        Self { dir }
    }

    /// Directory holding this namespace's records.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.dir.join(sanitize_key(key)))
    }

    fn entries(&self) -> Result<Vec<(String, PathBuf)>, StorageError> {
        let read_dir = match fs::read_dir(&self.dir) {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(storage_err(err)),
        };

        let mut out = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(storage_err)?;
            if !entry.file_type().map_err(storage_err)?.is_file() {
                continue;
            }
            // Leftover temp files and foreign files do not decode to a key.
            let Some(key) = entry.file_name().to_str().and_then(unsanitize_key) else {
                continue;
            };
            out.push((key, entry.path()));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

impl StorageBackend for FileBackend {
    #[instrument(skip_all, fields(key))]
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(path) {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(storage_err(err)),
        }
    }

    #[instrument(skip_all, fields(key))]
    fn set(&self, key: &str, record: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        write_record(&self.dir, &path, record)
    }

    #[instrument(skip_all, fields(key))]
    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(storage_err(err)),
        }
    }

    #[instrument(skip_all)]
    fn clear(&self) -> Result<(), StorageError> {
        for (_, path) in self.entries()? {
            match fs::remove_file(path) {
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(storage_err(err)),
            }
        }
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.path_for(key)?.is_file())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries()?.into_iter().map(|(key, _)| key).collect())
    }
}

fn write_record(dir: &Path, path: &Path, record: &str) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(storage_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(storage_err)?;
    tmp.write_all(record.as_bytes()).map_err(storage_err)?;
    tmp.flush().map_err(storage_err)?;
    tmp.persist(path).map_err(|e| storage_err(e.error))?;
    Ok(())
}

fn sanitize_key(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(key)
}

fn unsanitize_key(name: &str) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(name).ok()?;
    String::from_utf8(bytes).ok()
}

fn storage_err<E: ToString>(err: E) -> StorageError {
    StorageError::Io {
        reason: err.to_string(),
    }
}
