//! Test helpers shared across modules.

use std::path::{Path, PathBuf};

/// Write an executable shell script standing in for FBX2glTF.
pub fn write_script(dir: &Path, name: &str, contents: &str) -> PathBuf {
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    {
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.sync_all().unwrap();
    }
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
