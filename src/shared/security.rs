use crate::shared::error::RegistryError;
use crate::shared::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Largest collector or definition file accepted (256 MB).
/// Container build records can be large, but anything beyond this is a broken export.
pub const MAX_INPUT_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// Reads an input file after rejecting symlinks, directories and oversized files.
///
/// # Arguments
/// * `path` - File to read
/// * `description` - What the file is, for error messages (e.g. "collector output")
///
/// # Errors
/// - `RegistryError::NotFound` when the file does not exist
/// - `RegistryError::SourceUnavailable` for I/O conditions that may clear up on retry
/// - `RegistryError::FileReadError` for everything else
pub fn read_checked_file(path: &Path, description: &str) -> Result<String> {
    let metadata = fs::symlink_metadata(path).map_err(|e| classify_io_error(path, description, e))?;

    if metadata.is_symlink() {
        return Err(RegistryError::FileReadError {
            path: path.to_path_buf(),
            details: format!(
                "Security: {} is a symbolic link. Symbolic links are not followed.",
                description
            ),
        }
        .into());
    }
    if !metadata.is_file() {
        return Err(RegistryError::FileReadError {
            path: path.to_path_buf(),
            details: format!("{} is not a regular file", description),
        }
        .into());
    }
    validate_file_size(metadata.len(), path, MAX_INPUT_FILE_SIZE)?;

    fs::read_to_string(path).map_err(|e| classify_io_error(path, description, e))
}

/// Rejects files larger than `max_size`
pub fn validate_file_size(file_size: u64, path: &Path, max_size: u64) -> Result<()> {
    if file_size > max_size {
        return Err(RegistryError::FileReadError {
            path: path.to_path_buf(),
            details: format!(
                "Security: file is too large ({} bytes). Maximum allowed size is {} bytes.",
                file_size, max_size
            ),
        }
        .into());
    }
    Ok(())
}

fn classify_io_error(path: &Path, description: &str, err: std::io::Error) -> anyhow::Error {
    match err.kind() {
        ErrorKind::NotFound => RegistryError::NotFound {
            entity: "File",
            key: path.display().to_string(),
            hint: format!("Check that the {} was exported to this location", description),
        }
        .into(),
        ErrorKind::TimedOut | ErrorKind::Interrupted | ErrorKind::WouldBlock => {
            RegistryError::SourceUnavailable {
                details: format!("{}: {}", path.display(), err),
            }
            .into()
        }
        _ => RegistryError::FileReadError {
            path: path.to_path_buf(),
            details: err.to_string(),
        }
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::error::is_transient_error;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_read_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("build.json");
        fs::write(&file_path, "{}").unwrap();

        assert_eq!(read_checked_file(&file_path, "collector output").unwrap(), "{}");
    }

    #[test]
    fn test_missing_file_is_not_found_and_not_transient() {
        let err = read_checked_file(Path::new("/nonexistent/build.json"), "collector output")
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegistryError>(),
            Some(RegistryError::NotFound { .. })
        ));
        assert!(!is_transient_error(&err));
    }

    #[test]
    fn test_directory_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_checked_file(temp_dir.path(), "product definitions").unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("real.json");
        let link = temp_dir.path().join("link.json");
        fs::write(&target, "{}").unwrap();
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let err = read_checked_file(&link, "collector output").unwrap_err();
        assert!(format!("{:?}", err).contains("symbolic link"));
    }

    #[test]
    fn test_validate_file_size_exceeds_limit() {
        let path = PathBuf::from("/test/file.json");
        assert!(validate_file_size(1000, &path, MAX_INPUT_FILE_SIZE).is_ok());
        let err = validate_file_size(MAX_INPUT_FILE_SIZE + 1, &path, MAX_INPUT_FILE_SIZE)
            .unwrap_err();
        assert!(format!("{:?}", err).contains("too large"));
    }
}
