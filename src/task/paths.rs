//! Path layout of the task tree.
//!
//! Nothing in here touches the filesystem.

use std::path::{Path, PathBuf};

use super::TaskId;

/// Subdirectory of the data root holding one directory per task.
pub const TASKS_DIR: &str = "tasks";

/// Extension accepted for uploads (compared case-insensitively).
pub const INPUT_EXTENSION: &str = "fbx";

/// Extension of the artifact written by the converter.
pub const OUTPUT_EXTENSION: &str = "glb";

pub fn tasks_root(data_dir: &Path) -> PathBuf {
    data_dir.join(TASKS_DIR)
}

pub fn task_dir_name(id: TaskId) -> String {
    format!("task-{}", id)
}

pub fn task_dir(data_dir: &Path, id: TaskId) -> PathBuf {
    tasks_root(data_dir).join(task_dir_name(id))
}

/// File name without its `.fbx` extension. Names without that extension are
/// returned unchanged.
pub fn file_stem(file_name: &str) -> &str {
    let suffix_len = INPUT_EXTENSION.len() + 1;
    if file_name.len() > suffix_len && file_name.is_char_boundary(file_name.len() - suffix_len) {
        let (stem, ext) = file_name.split_at(file_name.len() - suffix_len);
        if ext.starts_with('.') && ext[1..].eq_ignore_ascii_case(INPUT_EXTENSION) {
            return stem;
        }
    }
    file_name
}

pub fn input_path(task_dir: &Path, file_name: &str) -> PathBuf {
    task_dir.join(file_name)
}

/// Value passed to the converter's `-o` flag; the converter appends `.glb`.
pub fn output_base(task_dir: &Path, file_name: &str) -> PathBuf {
    task_dir.join(file_stem(file_name))
}

pub fn output_path(task_dir: &Path, file_name: &str) -> PathBuf {
    task_dir.join(format!("{}.{}", file_stem(file_name), OUTPUT_EXTENSION))
}

/// Location of the artifact as reported to clients:
/// `<data>/tasks/task-<id>/<stem>.glb`, always with forward slashes.
pub fn public_output_path(data_dir: &Path, id: TaskId, file_name: &str) -> String {
    let root = data_dir.to_string_lossy().replace('\\', "/");
    let root = root.trim_end_matches('/');
    let prefix = if root.is_empty() {
        String::new()
    } else {
        format!("{}/", root)
    };
    format!(
        "{}{}/{}/{}.{}",
        prefix,
        TASKS_DIR,
        task_dir_name(id),
        file_stem(file_name),
        OUTPUT_EXTENSION
    )
}
