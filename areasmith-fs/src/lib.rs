//! Capability-based filesystem helpers for output targets.
//!
//! Every helper resolves the parent directory through `cap-std` and then
//! operates on the file name relative to it.
#![forbid(unsafe_code)]

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};
use std::io;
use std::path::Component;

/// Open the parent directory of `path` and return it with the file name.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other(format!("{path} does not name a file")))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Create the parent directories of `path` when missing.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_str().is_empty() || parent == Utf8Path::new("/") {
        return Ok(());
    }
    let (base_dir, relative) = split_base(parent)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base_dir.create_dir_all(&relative)
}

/// Whether `path` exists and is a regular file. A missing parent directory
/// counts as "no file".
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match open_dir_and_file(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Remove the file at `path`, returning whether one was removed.
pub fn remove_file_if_exists(path: &Utf8Path) -> io::Result<bool> {
    if !file_is_file(path)? {
        return Ok(false);
    }
    let (dir, name) = open_dir_and_file(path)?;
    dir.remove_file(name.as_str())?;
    Ok(true)
}

/// Create or truncate the file at `path`, creating parent directories first.
pub fn create_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    ensure_parent_dir(path)?;
    let (dir, name) = open_dir_and_file(path)?;
    dir.create(name.as_str())
}

/// Split a directory path into an ambient base directory and the relative
/// remainder.
fn split_base(parent: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_parent = parent.as_std_path();
    let (base, relative) = match std_parent.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR.to_string());
            let relative = parent
                .strip_prefix(&base)
                .or_else(|_| parent.strip_prefix(prefix))
                .map_err(|_| io::Error::other(format!("cannot strip {prefix} from {parent}")))?
                .to_owned();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string());
            let relative = parent
                .strip_prefix(&base)
                .map_err(|_| io::Error::other(format!("cannot strip root from {parent}")))?
                .to_owned();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), parent.to_owned()),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use std::io::Write;
    use tempfile::TempDir;

    #[fixture]
    fn temp_dir() -> TempDir {
        TempDir::new().expect("create temp dir")
    }

    fn utf8(dir: &TempDir, relative: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(relative)).expect("utf-8 temp path")
    }

    #[rstest]
    fn creates_nested_files(temp_dir: TempDir) {
        let path = utf8(&temp_dir, "nested/deeper/out.txt");
        let mut file = create_utf8_file(&path).expect("create file");
        file.write_all(b"area").expect("write");
        assert!(file_is_file(&path).expect("stat"));
    }

    #[rstest]
    fn removes_only_existing_files(temp_dir: TempDir) {
        let path = utf8(&temp_dir, "areas.db");
        assert!(!remove_file_if_exists(&path).expect("nothing to remove"));
        create_utf8_file(&path).expect("create file");
        assert!(remove_file_if_exists(&path).expect("remove"));
        assert!(!file_is_file(&path).expect("stat"));
    }

    #[rstest]
    fn missing_parent_is_not_a_file(temp_dir: TempDir) {
        let path = utf8(&temp_dir, "absent/areas.db");
        assert!(!file_is_file(&path).expect("stat"));
    }
}
