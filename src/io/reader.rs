//! Plain-file read/write helpers shared by every on-disk store
//! (session logs, chunk logs, the index metadata log, config, project
//! state, artifacts).
//!
//! Everything here goes through whole-file `std::fs` calls: stores are
//! small JSONL/JSON documents, not multi-gigabyte transcripts, so there
//! is no mmap fast path to earn its keep.

use crate::error::{IoError, Result};
use std::path::Path;

/// Reads a file to a UTF-8 string.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, cannot be read, or
/// is not valid UTF-8.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path_ref = path.as_ref();
    let path_str = path_ref.to_string_lossy().to_string();

    if !path_ref.exists() {
        return Err(IoError::FileNotFound { path: path_str }.into());
    }

    std::fs::read_to_string(path_ref).map_err(|e| {
        IoError::ReadFailed {
            path: path_str,
            reason: e.to_string(),
        }
        .into()
    })
}

/// Writes `content` to `path`, creating any missing parent directories
/// first.
///
/// # Errors
///
/// Returns an error if directory creation or the write fails.
pub fn write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path_ref = path.as_ref();
    let path_str = path_ref.to_string_lossy().to_string();

    if let Some(parent) = path_ref.parent()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::DirectoryFailed {
            path: parent.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }

    std::fs::write(path_ref, content).map_err(|e| {
        IoError::WriteFailed {
            path: path_str,
            reason: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_back_what_was_written() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.jsonl");
        write_file(&path, "{\"role\":\"user\"}\n").unwrap();
        assert_eq!(read_file(&path).unwrap(), "{\"role\":\"user\"}\n");
    }

    #[test]
    fn read_nonexistent_file_errors() {
        let result = read_file("/nonexistent/path/file.txt");
        assert!(result.is_err());
    }

    #[test]
    fn write_creates_missing_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a/b/c/deep.json");
        write_file(&path, "{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn write_overwrites_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("state.json");
        write_file(&path, "{\"v\":1}").unwrap();
        write_file(&path, "{\"v\":2}").unwrap();
        assert_eq!(read_file(&path).unwrap(), "{\"v\":2}");
    }

    #[test]
    fn reads_multibyte_utf8_content() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("unicode.txt");
        write_file(&path, "hello 世界").unwrap();
        assert_eq!(read_file(&path).unwrap(), "hello 世界");
    }

    #[test]
    fn read_invalid_utf8_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.bin");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x01]).unwrap();
        assert!(read_file(&path).is_err());
    }

    #[test]
    fn reads_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.txt");
        write_file(&path, "").unwrap();
        assert_eq!(read_file(&path).unwrap(), "");
    }
}
