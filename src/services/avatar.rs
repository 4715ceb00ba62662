use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Upload size cap, matching the 2048 KiB form rule.
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

const AVATAR_PREFIX: &str = "avatars";

/// Image formats accepted for avatars, detected by magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    const fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(Self::Png)
        } else if bytes.starts_with(b"\xff\xd8\xff") {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(Self::Gif)
        } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }
}

/// Why an upload was rejected before touching the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarRejection {
    NotAnImage,
    TooLarge,
}

impl AvatarRejection {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NotAnImage => "The avatar must be an image (png, jpg, gif, or webp)",
            Self::TooLarge => "The avatar may not be greater than 2048 kilobytes",
        }
    }
}

/// Local public blob store for avatar files.
///
/// Files live under `<root>/avatars/` with random names; the relative path
/// (`avatars/<file>`) is what gets persisted on the user row and served at
/// `/storage/avatars/<file>`.
#[derive(Clone)]
pub struct AvatarStore {
    root: PathBuf,
}

impl AvatarStore {
    #[must_use]
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            root: storage_path.into(),
        }
    }

    /// Check size and magic bytes without writing anything.
    pub fn validate(bytes: &[u8]) -> Result<ImageFormat, AvatarRejection> {
        let format = ImageFormat::sniff(bytes).ok_or(AvatarRejection::NotAnImage)?;
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(AvatarRejection::TooLarge);
        }
        Ok(format)
    }

    /// Persist a validated upload and return its relative path.
    pub async fn save(&self, bytes: &[u8], format: ImageFormat) -> Result<String> {
        let dir = self.root.join(AVATAR_PREFIX);
        if !dir.exists() {
            fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let file_name = format!("{}.{}", uuid::Uuid::new_v4(), format.extension());
        let file_path = dir.join(&file_name);

        fs::write(&file_path, bytes)
            .await
            .with_context(|| format!("Failed to write avatar to {}", file_path.display()))?;

        info!(path = %file_path.display(), "Stored avatar");

        Ok(format!("{AVATAR_PREFIX}/{file_name}"))
    }

    /// Remove a stored avatar. A missing file is not an error.
    pub async fn delete(&self, relative_path: &str) -> Result<()> {
        // Stored paths are always "avatars/<file>"; refuse anything that
        // could escape the storage root.
        let name = Path::new(relative_path)
            .file_name()
            .context("Invalid avatar path")?;

        let file_path = self.root.join(AVATAR_PREFIX).join(name);
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to delete {}", file_path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\x00\x00";

    #[test]
    fn test_sniff_formats() {
        assert_eq!(ImageFormat::sniff(PNG_HEADER), Some(ImageFormat::Png));
        assert_eq!(
            ImageFormat::sniff(b"\xff\xd8\xff\xe0rest"),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(ImageFormat::sniff(b"GIF89a...."), Some(ImageFormat::Gif));
        assert_eq!(
            ImageFormat::sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
        assert_eq!(ImageFormat::sniff(b"plain text"), None);
        assert_eq!(ImageFormat::sniff(b""), None);
    }

    #[test]
    fn test_validate_rejects_oversized_image() {
        let mut bytes = PNG_HEADER.to_vec();
        bytes.resize(MAX_AVATAR_BYTES + 1, 0);
        assert_eq!(
            AvatarStore::validate(&bytes),
            Err(AvatarRejection::TooLarge)
        );
    }

    #[test]
    fn test_validate_rejects_non_image() {
        assert_eq!(
            AvatarStore::validate(b"%PDF-1.4 not an image"),
            Err(AvatarRejection::NotAnImage)
        );
    }

    #[tokio::test]
    async fn test_save_and_delete_roundtrip() {
        let dir = std::env::temp_dir().join(format!("roster-avatar-test-{}", uuid::Uuid::new_v4()));
        let store = AvatarStore::new(&dir);

        let path = store
            .save(PNG_HEADER, ImageFormat::Png)
            .await
            .expect("save failed");
        assert!(path.starts_with("avatars/"));
        assert!(path.ends_with(".png"));
        assert!(dir.join(&path).exists());

        store.delete(&path).await.expect("delete failed");
        assert!(!dir.join(&path).exists());

        // Deleting again is a no-op.
        store.delete(&path).await.expect("second delete failed");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
