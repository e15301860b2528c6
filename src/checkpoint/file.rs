use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::{Checkpoint, CheckpointHandle, CheckpointStore};
use crate::error::{Error, Result};

/// Stores each checkpoint as `<directory>/<key>.json`.
///
/// Saves write a hidden temporary file next to the target under an
/// exclusive lock and rename it over the target, so a crash mid-save
/// leaves the previous checkpoint intact. Loads take a shared lock.
/// Distinct keys use distinct files and never interleave.
///
/// # Examples
///
/// ```no_run
/// use topic_optimizer::checkpoint::{CheckpointHandle, CheckpointStore, FileCheckpointStore};
///
/// let store = FileCheckpointStore::new("checkpoints");
/// let handle = CheckpointHandle::new("partial_result", 0);
/// if store.exists(&handle) {
///     let checkpoint = store.load(&handle).unwrap();
///     println!("{} evaluations", checkpoint.n_evaluations);
/// }
/// ```
#[derive(Clone, Debug)]
pub struct FileCheckpointStore {
    directory: PathBuf,
}

impl FileCheckpointStore {
    /// Creates a store rooted at `directory`. The directory is created on
    /// the first save.
    #[must_use]
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// The root directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The file a handle maps to.
    #[must_use]
    pub fn path(&self, handle: &CheckpointHandle) -> PathBuf {
        self.directory.join(format!("{}.json", handle.key))
    }

    fn write(&self, handle: &CheckpointHandle, json: &str) -> std::io::Result<()> {
        fs::create_dir_all(&self.directory)?;
        let path = self.path(handle);
        let tmp_path = self.directory.join(format!(".{}.json.tmp", handle.key));

        let file = File::create(&tmp_path)?;
        file.lock_exclusive()?;
        let mut writer = BufWriter::new(&file);
        writer.write_all(json.as_bytes())?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
        file.unlock()?;
        fs::rename(&tmp_path, &path)
    }

    fn read(path: &Path) -> std::io::Result<String> {
        let mut file = File::open(path)?;
        file.lock_shared()?;
        let mut json = String::new();
        let read = file.read_to_string(&mut json);
        file.unlock()?;
        read.map(|_| json)
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, handle: &CheckpointHandle, checkpoint: &Checkpoint) -> Result<()> {
        let json = checkpoint.to_json(&handle.key)?;
        self.write(handle, &json).map_err(|e| Error::CheckpointIo {
            key: handle.key.clone(),
            reason: e.to_string(),
        })
    }

    fn load(&self, handle: &CheckpointHandle) -> Result<Checkpoint> {
        let json = Self::read(&self.path(handle)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::CheckpointNotFound {
                    key: handle.key.clone(),
                }
            } else {
                Error::CheckpointIo {
                    key: handle.key.clone(),
                    reason: e.to_string(),
                }
            }
        })?;
        Checkpoint::from_json(&handle.key, &json)
    }

    fn exists(&self, handle: &CheckpointHandle) -> bool {
        self.path(handle).is_file()
    }
}
