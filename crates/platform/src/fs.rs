//! Filesystem helpers for copy and delete steps.

use aucat_errors::{Error, InstallError, PlatformError};
use globset::GlobBuilder;
use std::path::{Component, Path, PathBuf};
use tokio::task;
use walkdir::WalkDir;

/// Result type for filesystem operations
pub type Result<T> = std::result::Result<T, Error>;

const GLOB_CHARS: &[char] = &['*', '?', '['];

/// Copy whatever `from` names into the directory `to` and return the number of
/// files written.
///
/// - a file is copied into `to` under its own name
/// - a directory is copied recursively into `to`
/// - a pattern containing `*`, `?` or `[` is matched below its literal prefix;
///   matches keep their path relative to that prefix
/// - a source that does not exist matches nothing
///
/// # Errors
///
/// Returns an error if the pattern is invalid or a copy fails.
pub async fn copy_by_pattern(from: &Path, to: &Path) -> Result<usize> {
    let from = from.to_path_buf();
    let to = to.to_path_buf();
    task::spawn_blocking(move || copy_blocking(&from, &to))
        .await
        .map_err(|e| Error::internal(format!("copy task failed: {e}")))?
}

fn copy_blocking(from: &Path, to: &Path) -> Result<usize> {
    if let Some((base, pattern)) = split_glob(from) {
        return copy_glob(&base, &pattern, to);
    }
    if from.is_file() {
        return copy_file_into(from, to).map(|()| 1);
    }
    if from.is_dir() {
        return copy_tree(from, to);
    }
    tracing::debug!(from = %from.display(), "copy source does not exist");
    Ok(0)
}

/// Split a path into its literal directory prefix and the glob remainder.
fn split_glob(path: &Path) -> Option<(PathBuf, String)> {
    let mut base = PathBuf::new();
    let mut rest: Vec<String> = Vec::new();
    for component in path.components() {
        let text = component.as_os_str().to_string_lossy();
        if rest.is_empty() && !matches!(component, Component::Normal(_)) {
            base.push(component);
            continue;
        }
        if rest.is_empty() && !text.contains(GLOB_CHARS) {
            base.push(component);
        } else {
            rest.push(text.into_owned());
        }
    }
    if rest.is_empty() {
        None
    } else {
        Some((base, rest.join("/")))
    }
}

fn copy_glob(base: &Path, pattern: &str, to: &Path) -> Result<usize> {
    let matcher = GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| PlatformError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?
        .compile_matcher();

    if !base.is_dir() {
        return Ok(0);
    }

    let mut count = 0;
    let mut walker = WalkDir::new(base).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.map_err(|e| walk_error(base, &e))?;
        let Ok(rel) = entry.path().strip_prefix(base) else {
            continue;
        };
        if !matcher.is_match(rel) {
            continue;
        }
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            count += copy_tree(entry.path(), &dest)?;
            walker.skip_current_dir();
        } else {
            let parent = dest.parent().unwrap_or(to);
            copy_file_into(entry.path(), parent)?;
            count += 1;
        }
    }
    Ok(count)
}

fn copy_file_into(src: &Path, dst_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dst_dir).map_err(|e| Error::io_with_path(&e, dst_dir))?;
    let file_name = src.file_name().ok_or_else(|| PlatformError::FilesystemOperationFailed {
        operation: "copy".to_string(),
        message: format!("no file name in {}", src.display()),
    })?;
    let dest = dst_dir.join(file_name);
    std::fs::copy(src, &dest).map_err(|e| Error::io_with_path(&e, &dest))?;
    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    std::fs::create_dir_all(dst).map_err(|e| Error::io_with_path(&e, dst))?;
    let mut count = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| walk_error(src, &e))?;
        let Ok(rel) = entry.path().strip_prefix(src) else {
            continue;
        };
        let dest = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| Error::io_with_path(&e, &dest))?;
        } else {
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
            }
            std::fs::copy(entry.path(), &dest).map_err(|e| Error::io_with_path(&e, &dest))?;
            count += 1;
        }
    }
    Ok(count)
}

fn walk_error(root: &Path, err: &walkdir::Error) -> Error {
    PlatformError::FilesystemOperationFailed {
        operation: "walk".to_string(),
        message: format!("{}: {err}", root.display()),
    }
    .into()
}

/// Remove a file or directory tree.
///
/// Returns `Ok(false)` when nothing exists at `path`. A failed removal is
/// retried once after re-reading the entry type.
///
/// # Errors
///
/// Returns `InstallError::DeleteFailed` when both attempts fail.
pub async fn delete_path(path: &Path) -> Result<bool> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(Error::io_with_path(&e, path)),
    };

    if remove(path, metadata.is_dir()).await.is_ok() {
        return Ok(true);
    }

    let retry = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => remove(path, metadata.is_dir()).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    retry.map(|()| true).map_err(|e| {
        InstallError::DeleteFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        }
        .into()
    })
}

async fn remove(path: &Path, is_dir: bool) -> std::io::Result<()> {
    if is_dir {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn split_glob_finds_literal_prefix() {
        let (base, pattern) = split_glob(Path::new("/tmp/pkg/x/*.aui2")).unwrap();
        assert_eq!(base, PathBuf::from("/tmp/pkg/x"));
        assert_eq!(pattern, "*.aui2");

        let (base, pattern) = split_glob(Path::new("/tmp/pkg/*/Plugin/*.auo2")).unwrap();
        assert_eq!(base, PathBuf::from("/tmp/pkg"));
        assert_eq!(pattern, "*/Plugin/*.auo2");

        assert!(split_glob(Path::new("/tmp/pkg/plain.txt")).is_none());
    }

    #[tokio::test]
    async fn copies_single_file_into_directory() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("a.aui2");
        std::fs::write(&src, b"x").unwrap();
        let dest = temp.path().join("Plugin");

        let count = copy_by_pattern(&src, &dest).await.unwrap();
        assert_eq!(count, 1);
        assert!(dest.join("a.aui2").is_file());
    }

    #[tokio::test]
    async fn delete_missing_path_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let existed = delete_path(&temp.path().join("nope")).await.unwrap();
        assert!(!existed);
    }
}
