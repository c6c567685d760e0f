//! Avatar files on disk, addressed by a path relative to the avatars dir.

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use uuid::Uuid;

use crate::config::MAX_UPLOAD_BYTES;

const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
];

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("File too large ({size} bytes, limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("File is empty")]
    Empty,

    #[error("Invalid stored path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write an avatar and return its relative path (`<user_id>.<ext>`).
/// A new upload replaces any earlier avatar, whatever its type.
pub fn save_avatar(
    dir: &Path,
    user_id: &Uuid,
    bytes: &[u8],
    content_type: &str,
) -> Result<String, StorageError> {
    if bytes.is_empty() {
        return Err(StorageError::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(StorageError::TooLarge {
            size: bytes.len(),
            limit: MAX_UPLOAD_BYTES,
        });
    }
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let extension = ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| StorageError::UnsupportedType(content_type.to_string()))?;

    std::fs::create_dir_all(dir)?;
    let relative = format!("{user_id}.{extension}");
    std::fs::write(dir.join(&relative), bytes)?;
    for (_, other) in ALLOWED_IMAGE_TYPES.iter().filter(|(_, ext)| *ext != extension) {
        match std::fs::remove_file(dir.join(format!("{user_id}.{other}"))) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
    }
    tracing::debug!(user_id = %user_id, path = %relative, "Avatar stored");
    Ok(relative)
}

/// Read an avatar back with its MIME type.
pub fn load_avatar(dir: &Path, relative: &str) -> Result<(Vec<u8>, String), StorageError> {
    let path = resolve(dir, relative)?;
    let bytes = std::fs::read(&path)?;
    let mime = mime_guess::from_path(&path).first_or_octet_stream().to_string();
    Ok((bytes, mime))
}

/// Only plain file names below `dir` are accepted.
fn resolve(dir: &Path, relative: &str) -> Result<PathBuf, StorageError> {
    let candidate = Path::new(relative);
    let mut components = candidate.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(dir.join(candidate)),
        _ => Err(StorageError::InvalidPath(relative.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let tmp = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let path = save_avatar(tmp.path(), &id, b"\x89PNG\r\n", "image/png").unwrap();
        assert_eq!(path, format!("{id}.png"));

        let (bytes, mime) = load_avatar(tmp.path(), &path).unwrap();
        assert_eq!(bytes, b"\x89PNG\r\n");
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn new_avatar_replaces_other_type() {
        let tmp = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();
        let png = save_avatar(tmp.path(), &id, b"\x89PNG\r\n", "image/png").unwrap();
        let jpg = save_avatar(tmp.path(), &id, b"\xff\xd8\xff", "image/jpeg").unwrap();

        assert!(!tmp.path().join(&png).exists());
        assert!(tmp.path().join(&jpg).exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn rejects_non_images() {
        let tmp = tempfile::tempdir().unwrap();
        let err = save_avatar(tmp.path(), &Uuid::new_v4(), b"%PDF", "application/pdf").unwrap_err();
        assert!(matches!(err, StorageError::UnsupportedType(_)));
    }

    #[test]
    fn rejects_oversized_and_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            save_avatar(tmp.path(), &Uuid::new_v4(), &big, "image/png"),
            Err(StorageError::TooLarge { .. })
        ));
        assert!(matches!(
            save_avatar(tmp.path(), &Uuid::new_v4(), b"", "image/png"),
            Err(StorageError::Empty)
        ));
    }

    #[test]
    fn refuses_paths_outside_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_avatar(tmp.path(), "../crm.db"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            load_avatar(tmp.path(), "/etc/passwd"),
            Err(StorageError::InvalidPath(_))
        ));
    }
}
