use std::path::Path;

use tracing::{info, warn};

use crate::forms::ImageUpload;
use crate::utils::error::AppError;

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Width of the `events.image` column.
pub const MAX_FILE_NAME_LEN: usize = 200;

/// Reduces a client-supplied file name to `[A-Za-z0-9._-]`, dropping any
/// directory components and leading dots. Returns `None` if nothing is left.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();

    if cleaned.is_empty() {
        None
    } else {
        Some(shorten(cleaned))
    }
}

/// Cuts the stem so the name fits `MAX_FILE_NAME_LEN`, keeping the extension.
/// Only ever called on ASCII names.
fn shorten(name: String) -> String {
    if name.len() <= MAX_FILE_NAME_LEN {
        return name;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if ext.len() < MAX_FILE_NAME_LEN / 2 && !stem.is_empty() => {
            let keep = MAX_FILE_NAME_LEN - ext.len() - 1;
            format!("{}.{ext}", &stem[..keep.min(stem.len())])
        }
        _ => name[..MAX_FILE_NAME_LEN].to_string(),
    }
}

/// Writes the upload into `dir` and returns the stored file name.
///
/// Files with the same sanitized name overwrite each other.
pub async fn store_image(dir: &Path, upload: &ImageUpload) -> Result<String, AppError> {
    let file_name = sanitize_filename(&upload.file_name)
        .ok_or_else(|| AppError::field("img", "The file name is not usable"))?;

    let extension = Path::new(&file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::field(
            "img",
            format!("Images must be one of: {}", ALLOWED_IMAGE_EXTENSIONS.join(", ")),
        ));
    }

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {e}")))?;
    tokio::fs::write(dir.join(&file_name), &upload.bytes)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to store upload {file_name}: {e}")))?;

    info!(file = %file_name, bytes = upload.bytes.len(), "Stored event image");
    Ok(file_name)
}

/// Removes an image stored for a write that did not go through.
pub async fn discard_image(dir: &Path, file_name: &str) {
    match tokio::fs::remove_file(dir.join(file_name)).await {
        Ok(()) => info!(file = %file_name, "Discarded unreferenced event image"),
        Err(e) => warn!(file = %file_name, error = %e, "Could not discard event image"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("poster.jpg").as_deref(), Some("poster.jpg"));
        assert_eq!(
            sanitize_filename("My Gig Poster.PNG").as_deref(),
            Some("My_Gig_Poster.PNG")
        );
        assert_eq!(
            sanitize_filename("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\.hidden.png").as_deref(),
            Some("hidden.png")
        );
        assert_eq!(sanitize_filename("ä€.."), None);
    }

    #[test]
    fn test_long_names_fit_the_image_column() {
        let raw = format!("{}.jpeg", "a".repeat(500));
        let name = sanitize_filename(&raw).expect("usable");
        assert_eq!(name.len(), MAX_FILE_NAME_LEN);
        assert!(name.ends_with(".jpeg"));
        assert!(name.starts_with("aaaa"));

        let short = sanitize_filename("poster.png").expect("usable");
        assert_eq!(short, "poster.png");
    }

    #[tokio::test]
    async fn test_store_image_writes_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload = ImageUpload {
            file_name: "show night.png".into(),
            bytes: Bytes::from_static(b"\x89PNG"),
        };

        let stored = store_image(dir.path(), &upload).await.expect("stored");
        assert_eq!(stored, "show_night.png");
        let written = std::fs::read(dir.path().join(&stored)).expect("read back");
        assert_eq!(written, b"\x89PNG");
    }

    #[tokio::test]
    async fn test_discard_image_removes_the_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload = ImageUpload {
            file_name: "flyer.gif".into(),
            bytes: Bytes::from_static(b"GIF89a"),
        };
        let stored = store_image(dir.path(), &upload).await.expect("stored");
        assert!(dir.path().join(&stored).exists());

        discard_image(dir.path(), &stored).await;
        assert!(!dir.path().join(&stored).exists());

        // A second discard only logs.
        discard_image(dir.path(), &stored).await;
    }

    #[tokio::test]
    async fn test_store_image_rejects_other_extensions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let upload = ImageUpload {
            file_name: "script.sh".into(),
            bytes: Bytes::from_static(b"#!/bin/sh"),
        };
        assert!(store_image(dir.path(), &upload).await.is_err());
    }
}
