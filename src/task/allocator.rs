//! Task id allocation and workspace creation.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

use super::paths;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Failed to prepare workspace {path}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Numeric task identifier, unique for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One request's workspace. The directory exists and was empty when the
/// task was handed out.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub dir: PathBuf,
    data_dir: PathBuf,
}

impl Task {
    pub fn input_path(&self, file_name: &str) -> PathBuf {
        paths::input_path(&self.dir, file_name)
    }

    pub fn output_base(&self, file_name: &str) -> PathBuf {
        paths::output_base(&self.dir, file_name)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        paths::output_path(&self.dir, file_name)
    }

    pub fn public_output_path(&self, file_name: &str) -> String {
        paths::public_output_path(&self.data_dir, self.id, file_name)
    }
}

/// Hands out task ids and their workspace directories.
///
/// Ids start at 1 and are never reused within a process. They are not
/// persisted, so after a restart ids start over and stale workspaces with
/// the same id are emptied on reuse.
#[derive(Debug)]
pub struct TaskAllocator {
    data_dir: PathBuf,
    next_id: AtomicU64,
}

impl TaskAllocator {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create `<data>/tasks` if needed.
    pub async fn prepare_root(&self) -> Result<(), TaskError> {
        let root = paths::tasks_root(&self.data_dir);
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| TaskError::Workspace { path: root, source })
    }

    /// Reserve the next id without touching disk.
    pub fn next_id(&self) -> TaskId {
        TaskId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Reserve an id and create its (empty) workspace directory.
    pub async fn allocate(&self) -> Result<Task, TaskError> {
        let id = self.next_id();
        let dir = paths::task_dir(&self.data_dir, id);

        empty_dir(&dir)
            .await
            .map_err(|source| TaskError::Workspace {
                path: dir.clone(),
                source,
            })?;

        tracing::debug!("Allocated task {} at {}", id, dir.display());

        Ok(Task {
            id,
            dir,
            data_dir: self.data_dir.clone(),
        })
    }
}

/// Make sure `path` is an existing, empty directory.
async fn empty_dir(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            tracing::warn!("Workspace {} already existed, emptied it", path.display());
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    tokio::fs::create_dir_all(path).await
}
