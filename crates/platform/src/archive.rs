//! Archive extraction utilities

use aucat_errors::{Error, PlatformError};
use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::task;

/// Magic bytes opening an embedded 7z stream.
pub const SFX_SIGNATURE: &[u8] = b"\x37\x7A\xBC\xAF\x27\x1C";

fn archive_error(path: &Path, message: impl Into<String>) -> Error {
    PlatformError::InvalidArchive {
        path: path.display().to_string(),
        message: message.into(),
    }
    .into()
}

/// Extract a zip archive into `dest_dir`, creating it when missing.
///
/// Entries whose names escape the destination are skipped.
///
/// # Errors
///
/// Returns an error if the archive cannot be opened or read, or if an entry
/// cannot be written.
pub async fn extract_zip(archive_path: &Path, dest_dir: &Path) -> Result<(), Error> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| Error::io_with_path(&e, dest_dir))?;

    let archive_path = archive_path.to_path_buf();
    let dest_dir = dest_dir.to_path_buf();

    task::spawn_blocking(move || extract_zip_blocking(&archive_path, &dest_dir))
        .await
        .map_err(|e| Error::internal(format!("zip extraction task failed: {e}")))?
}

fn extract_zip_blocking(archive_path: &Path, dest_dir: &Path) -> Result<(), Error> {
    let file = File::open(archive_path).map_err(|e| Error::io_with_path(&e, archive_path))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| archive_error(archive_path, format!("failed to read zip archive: {e}")))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| archive_error(archive_path, format!("failed to read zip entry: {e}")))?;

        let outpath = match entry.enclosed_name() {
            Some(path) => dest_dir.join(path),
            None => {
                tracing::warn!(entry = entry.name(), "skipping zip entry outside destination");
                continue;
            }
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath).map_err(|e| Error::io_with_path(&e, &outpath))?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let mut outfile = File::create(&outpath).map_err(|e| Error::io_with_path(&e, &outpath))?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| Error::io_with_path(&e, &outpath))?;
    }

    tracing::debug!(
        archive = %archive_path.display(),
        dest = %dest_dir.display(),
        entries = archive.len(),
        "zip extracted"
    );
    Ok(())
}

/// Extract the 7z payload embedded in a self-extracting executable.
///
/// The payload starts at the first occurrence of [`SFX_SIGNATURE`]; everything
/// before it is the executable stub and is ignored.
///
/// # Errors
///
/// Returns an error if the file cannot be read, carries no 7z signature, or
/// the payload fails to decompress.
pub async fn extract_sfx(sfx_path: &Path, dest_dir: &Path) -> Result<(), Error> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| Error::io_with_path(&e, dest_dir))?;

    let sfx_path: PathBuf = sfx_path.to_path_buf();
    let dest_dir: PathBuf = dest_dir.to_path_buf();

    task::spawn_blocking(move || {
        let bytes = std::fs::read(&sfx_path).map_err(|e| Error::io_with_path(&e, &sfx_path))?;
        let offset = memchr::memmem::find(&bytes, SFX_SIGNATURE)
            .ok_or_else(|| archive_error(&sfx_path, "7z signature not found in SFX binary"))?;

        sevenz_rust2::decompress_with_extract_fn_and_password(
            Cursor::new(&bytes[offset..]),
            &dest_dir,
            sevenz_rust2::Password::empty(),
            sevenz_rust2::default_entry_extract_fn,
        )
        .map_err(|e| archive_error(&sfx_path, format!("7z decompress error: {e}")))?;

        tracing::debug!(
            sfx = %sfx_path.display(),
            offset,
            dest = %dest_dir.display(),
            "sfx payload extracted"
        );
        Ok(())
    })
    .await
    .map_err(|e| Error::internal(format!("sfx extraction task failed: {e}")))?
}
