//! Filesystem operations used by placement.

use crate::error::PlacementError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Mode for created directories: the file mode plus execute wherever read
/// is granted, and always for the owner.
pub fn directory_mode(file_mode: u32) -> u32 {
    (file_mode | ((file_mode & 0o444) >> 2) | 0o100) & 0o7777
}

/// Create `path` and any missing ancestors, applying `mode` to each level
/// that gets created. Existing levels are left as they are.
///
/// Returns how many directories were created.
pub fn create_directory_tree(path: &Path, mode: u32) -> Result<usize, PlacementError> {
    let mut missing: Vec<PathBuf> = Vec::new();
    let mut cursor = Some(path);
    while let Some(dir) = cursor {
        if dir.as_os_str().is_empty() || dir.is_dir() {
            break;
        }
        missing.push(dir.to_path_buf());
        cursor = dir.parent();
    }

    let dir_mode = directory_mode(mode);
    for dir in missing.iter().rev() {
        match fs::create_dir(dir) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => continue,
            Err(source) => {
                return Err(PlacementError::CreateDirectory {
                    path: dir.clone(),
                    source,
                })
            }
        }
        apply_mode(dir, dir_mode).map_err(|source| PlacementError::CreateDirectory {
            path: dir.clone(),
            source,
        })?;
        debug!("created directory {} ({:o})", dir.display(), dir_mode);
    }

    Ok(missing.len())
}

/// Move `from` to `to` without ever replacing an existing file.
///
/// A plain rename is tried first. When that fails (typically across
/// filesystems) the file is copied into a temporary file next to the target,
/// checked for size, linked into place and only then removed from the source.
pub fn move_file(from: &Path, to: &Path) -> Result<(), PlacementError> {
    if to.symlink_metadata().is_ok() {
        return Err(PlacementError::TargetExists {
            path: to.to_path_buf(),
        });
    }

    let move_error = |source: io::Error| PlacementError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_error) => {
            if !from.exists() {
                return Err(move_error(rename_error));
            }
            debug!(
                "rename {} -> {} failed ({}), copying instead",
                from.display(),
                to.display(),
                rename_error
            );
            copy_then_remove(from, to).map_err(|e| match e {
                CopyError::Exists => PlacementError::TargetExists {
                    path: to.to_path_buf(),
                },
                CopyError::Io(source) => move_error(source),
            })
        }
    }
}

enum CopyError {
    Exists,
    Io(io::Error),
}

impl From<io::Error> for CopyError {
    fn from(e: io::Error) -> Self {
        CopyError::Io(e)
    }
}

fn copy_then_remove(from: &Path, to: &Path) -> Result<(), CopyError> {
    let parent = to
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "target has no directory"))?;

    let source_size = fs::metadata(from)?.len();
    let mut temp = NamedTempFile::new_in(parent)?;
    {
        let mut source = fs::File::open(from)?;
        io::copy(&mut source, temp.as_file_mut())?;
    }
    temp.as_file().sync_all()?;

    let copied_size = temp.as_file().metadata()?.len();
    if copied_size != source_size {
        return Err(CopyError::Io(io::Error::other(format!(
            "copy verification failed: source {} bytes, copy {} bytes",
            source_size, copied_size
        ))));
    }

    temp.persist_noclobber(to).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            CopyError::Exists
        } else {
            CopyError::Io(e.error)
        }
    })?;

    if let Err(e) = fs::remove_file(from) {
        // Leave exactly one copy behind: the source.
        if let Err(cleanup) = fs::remove_file(to) {
            warn!(
                "could not remove copy {} after failing to remove {}: {}; both now exist",
                to.display(),
                from.display(),
                cleanup
            );
        }
        return Err(CopyError::Io(e));
    }
    Ok(())
}

/// Set the permission bits of a placed file; failures are only logged
pub fn set_file_mode(path: &Path, mode: u32) {
    if let Err(e) = apply_mode(path, mode) {
        warn!("could not set mode {:o} on {}: {}", mode, path.display(), e);
    }
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn directory_mode_adds_execute_bits() {
        assert_eq!(directory_mode(0o774), 0o775);
        assert_eq!(directory_mode(0o664), 0o775);
        assert_eq!(directory_mode(0o600), 0o700);
        assert_eq!(directory_mode(0o000), 0o100);
    }

    #[test]
    fn creates_missing_levels_only() {
        let temp_dir = TempDir::new().unwrap();
        let existing = temp_dir.path().join("2013");
        fs::create_dir(&existing).unwrap();

        let target = existing.join("2013_08_24").join("raw");
        assert_eq!(create_directory_tree(&target, 0o774).unwrap(), 2);
        assert!(target.is_dir());
        assert_eq!(create_directory_tree(&target, 0o774).unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn created_directories_get_mode() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("a").join("b");

        create_directory_tree(&target, 0o750).unwrap();
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o750);
    }

    #[test]
    fn file_in_the_way_fails() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("2013");
        fs::write(&blocker, b"").unwrap();

        let result = create_directory_tree(&blocker.join("2013_08_24"), 0o774);
        assert!(matches!(result, Err(PlacementError::CreateDirectory { .. })));
    }

    #[test]
    fn move_renames() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a.jpg");
        let to = temp_dir.path().join("b.jpg");
        fs::write(&from, b"pixels").unwrap();

        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"pixels");
    }

    #[test]
    fn move_never_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a.jpg");
        let to = temp_dir.path().join("b.jpg");
        fs::write(&from, b"new").unwrap();
        fs::write(&to, b"old").unwrap();

        let result = move_file(&from, &to);
        assert!(matches!(result, Err(PlacementError::TargetExists { .. })));
        assert_eq!(fs::read(&to).unwrap(), b"old");
        assert!(from.exists());
    }

    #[test]
    fn move_of_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = move_file(
            &temp_dir.path().join("gone.jpg"),
            &temp_dir.path().join("b.jpg"),
        );
        assert!(matches!(result, Err(PlacementError::Move { .. })));
    }

    #[test]
    fn copy_fallback_moves_content() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a.mov");
        let to = temp_dir.path().join("b.mov");
        fs::write(&from, vec![7u8; 200_000]).unwrap();

        assert!(copy_then_remove(&from, &to).is_ok());
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap().len(), 200_000);
    }

    #[cfg(unix)]
    #[test]
    fn undeletable_source_keeps_only_the_source() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new().unwrap();
        let inbox = temp_dir.path().join("inbox");
        let library = temp_dir.path().join("library");
        fs::create_dir_all(&inbox).unwrap();
        fs::create_dir_all(&library).unwrap();
        let from = inbox.join("a.mov");
        let to = library.join("a.mov");
        fs::write(&from, b"frames").unwrap();
        fs::set_permissions(&inbox, fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits do not bind a privileged user.
        let enforced = fs::write(inbox.join("check"), b"").is_err();
        if enforced {
            let result = copy_then_remove(&from, &to);
            assert!(matches!(result, Err(CopyError::Io(_))));
            assert!(from.exists());
            assert!(!to.exists());
        }

        fs::set_permissions(&inbox, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_mode_is_applied() {
        use std::os::unix::fs::PermissionsExt;
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.jpg");
        fs::write(&path, b"").unwrap();

        set_file_mode(&path, 0o666);
        assert_eq!(fs::metadata(&path).unwrap().permissions().mode() & 0o777, 0o666);
    }
}
