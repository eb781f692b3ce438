//! Loading local images into the base64 form the wire and the data file use.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to read image file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),
}

/// A base64-encoded image together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime_type: String,
    pub data: String,
}

fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

/// Read an image from disk and base64-encode it.
pub async fn read_image_base64(path: impl AsRef<Path>) -> Result<EncodedImage, MediaError> {
    let path = path.as_ref();
    let mime_type = mime_for_extension(path)
        .ok_or_else(|| MediaError::UnsupportedType(path.display().to_string()))?;
    let bytes = tokio::fs::read(path).await?;
    Ok(EncodedImage {
        mime_type: mime_type.to_string(),
        data: STANDARD.encode(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("avatar.png");
        tokio::fs::write(&path, b"not-really-a-png").await.unwrap();

        let image = read_image_base64(&path).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&image.data).unwrap(), b"not-really-a-png");
    }

    #[tokio::test]
    async fn test_unknown_extension_rejected() {
        let err = read_image_base64("photo.bmp").await.unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_image_base64(dir.path().join("missing.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Io(_)));
    }
}
