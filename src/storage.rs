// Locked, atomic JSON files for the booking store and the sync-state snapshot.
//
// ⚠️ VERSION BUMP REQUIRED:
// Changing the serialized shape of `Booking` or `PropertySyncState` requires
// bumping the version constant next to the type that owns the file.
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk envelope: `{ "version": N, "data": ... }`.
#[derive(serde::Serialize, serde::Deserialize)]
struct Versioned<T> {
    #[serde(default)]
    version: u32,
    data: T,
}

pub struct FileStorage;

impl FileStorage {
    fn get_lock_path(file_path: &Path) -> PathBuf {
        let mut lock_path = file_path.to_path_buf();
        if let Some(ext) = lock_path.extension() {
            let mut new_ext = ext.to_os_string();
            new_ext.push(".lock");
            lock_path.set_extension(new_ext);
        } else {
            lock_path.set_extension("lock");
        }
        lock_path
    }

    /// Run `f` while holding an exclusive lock on a sidecar `.lock` file, so
    /// two processes sharing a data dir serialize their read-modify-write.
    pub fn with_lock<F, T>(file_path: &Path, f: F) -> Result<T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(parent) = file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        let lock_path = Self::get_lock_path(file_path);
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        file.lock_exclusive()?;
        let result = f();
        file.unlock()?;
        result
    }

    /// Atomic write: write to a .tmp file then rename.
    pub fn atomic_write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> Result<()> {
        let path = path.as_ref();
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, contents)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    /// Read a versioned JSON file without locking. A missing file is
    /// `Ok(None)`; a version mismatch is an error so callers never
    /// overwrite data they could not read.
    pub fn read_versioned<T: DeserializeOwned>(path: &Path, version: u32) -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(path)?;
        let file: Versioned<T> = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse '{}'", path.display()))?;
        if file.version != version {
            anyhow::bail!(
                "'{}' has version {}, expected {}",
                path.display(),
                file.version,
                version
            );
        }
        Ok(Some(file.data))
    }

    /// Write a versioned JSON file without locking.
    pub fn write_versioned<T: Serialize>(path: &Path, version: u32, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(&Versioned { version, data })?;
        Self::atomic_write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AppContext, TestContext};

    #[test]
    fn versioned_round_trip_and_mismatch() {
        let ctx = TestContext::new();
        let path = ctx.get_data_dir().unwrap().join("thing.json");

        assert_eq!(FileStorage::read_versioned::<Vec<u32>>(&path, 1).unwrap(), None);

        FileStorage::with_lock(&path, || FileStorage::write_versioned(&path, 1, &vec![1u32, 2]))
            .unwrap();
        let back: Option<Vec<u32>> = FileStorage::read_versioned(&path, 1).unwrap();
        assert_eq!(back, Some(vec![1, 2]));

        assert!(FileStorage::read_versioned::<Vec<u32>>(&path, 2).is_err());
        assert!(path.with_extension("json.lock").exists());
        assert!(!path.with_extension("tmp").exists());
    }
}
