//! Local store backed by a directory capability.

use crate::registry::ports::{LocalStore, LocalStoreError, LocalStoreResult};
use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use std::io::ErrorKind;

const FILE_SUFFIX: &str = ".json";
const TEMP_SUFFIX: &str = ".json.tmp";

/// Stores each key as `<key>.json` inside one directory.
///
/// Keys may only contain ASCII letters, digits, `-`, `_` and `.`, and may not
/// start with `.`. Writes go through a temporary file that is renamed into
/// place.
#[derive(Debug)]
pub struct DirLocalStore {
    dir: Dir,
}

impl DirLocalStore {
    /// Wraps an already opened directory.
    #[must_use]
    pub const fn new(dir: Dir) -> Self {
        Self { dir }
    }

    /// Creates `path` if needed and opens it.
    ///
    /// # Errors
    ///
    /// Returns [`LocalStoreError::Storage`] when the directory cannot be
    /// created or opened.
    pub fn open(path: &Utf8Path) -> LocalStoreResult<Self> {
        Dir::create_ambient_dir_all(path, ambient_authority()).map_err(LocalStoreError::storage)?;
        let dir =
            Dir::open_ambient_dir(path, ambient_authority()).map_err(LocalStoreError::storage)?;
        Ok(Self::new(dir))
    }
}

fn file_name(key: &str, suffix: &str) -> LocalStoreResult<String> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'));
    if valid {
        Ok(format!("{key}{suffix}"))
    } else {
        Err(LocalStoreError::InvalidKey(key.to_owned()))
    }
}

impl LocalStore for DirLocalStore {
    fn load(&self, key: &str) -> LocalStoreResult<Option<String>> {
        let name = file_name(key, FILE_SUFFIX)?;
        match self.dir.read_to_string(&name) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(LocalStoreError::storage(err)),
        }
    }

    fn save(&self, key: &str, value: &str) -> LocalStoreResult<()> {
        let name = file_name(key, FILE_SUFFIX)?;
        let temp = file_name(key, TEMP_SUFFIX)?;
        self.dir
            .write(&temp, value)
            .map_err(LocalStoreError::storage)?;
        self.dir
            .rename(&temp, &self.dir, &name)
            .map_err(LocalStoreError::storage)
    }

    fn remove(&self, key: &str) -> LocalStoreResult<()> {
        let name = file_name(key, FILE_SUFFIX)?;
        match self.dir.remove_file(&name) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(LocalStoreError::storage(err)),
        }
    }
}
