//! Source file loading.

use crate::core::{FatalError, FatalResult};
use std::fs;
use std::path::Path;

/// Largest accepted source file.
pub const MAX_SOURCE_SIZE: u64 = 1024 * 1024;

/// Read a program from `path`. Non-regular files and files above
/// [`MAX_SOURCE_SIZE`] are rejected before any byte is read. Invalid UTF-8
/// is replaced; only the eight command bytes matter anyway.
pub fn load_source(path: &Path) -> FatalResult<String> {
    let metadata = fs::metadata(path)
        .map_err(|err| FatalError::SourceLoad(format!("{}: {}", path.display(), err)))?;
    if !metadata.is_file() {
        return Err(FatalError::SourceLoad(format!(
            "{}: not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_SOURCE_SIZE {
        return Err(FatalError::SourceLoad(format!(
            "{}: {} bytes exceeds the {} byte limit",
            path.display(),
            metadata.len(),
            MAX_SOURCE_SIZE
        )));
    }
    let bytes = fs::read(path)
        .map_err(|err| FatalError::SourceLoad(format!("{}: {}", path.display(), err)))?;
    log::debug!("loaded {} bytes from {}", bytes.len(), path.display());
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("bfjit-source-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn loads_regular_file() {
        let dir = scratch_dir("regular");
        let path = dir.join("hello.b");
        fs::write(&path, b"+++.\xFF").unwrap();
        let source = load_source(&path).unwrap();
        assert!(source.starts_with("+++."));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_directories_and_missing_files() {
        let dir = scratch_dir("dir");
        assert!(matches!(load_source(&dir), Err(FatalError::SourceLoad(_))));
        assert!(matches!(
            load_source(&dir.join("missing.b")),
            Err(FatalError::SourceLoad(_))
        ));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_oversized_files() {
        let dir = scratch_dir("large");
        let path = dir.join("large.b");
        fs::write(&path, vec![b'+'; MAX_SOURCE_SIZE as usize + 1]).unwrap();
        let err = load_source(&path).unwrap_err();
        assert!(err.to_string().contains("exceeds"));

        fs::write(&path, vec![b'+'; MAX_SOURCE_SIZE as usize]).unwrap();
        assert!(load_source(&path).is_ok());
        fs::remove_dir_all(&dir).unwrap();
    }
}
