use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Extensions accepted for supporting documents, with the content type each maps to.
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("webp", "image/webp"),
    ("pdf", "application/pdf"),
];

#[derive(Debug, Clone, Serialize)]
pub struct StoredUpload {
    /// Public path the file is served from.
    pub url: String,
    /// Name the client uploaded the file under.
    pub filename: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub content_type: String,
}

fn content_type_for(extension: &str) -> Option<&'static str> {
    ALLOWED_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, content_type)| *content_type)
}

/// Leading bytes must agree with the claimed type.
fn sniff_matches(content_type: &str, data: &[u8]) -> bool {
    match content_type {
        "image/jpeg" => data.starts_with(&[0xFF, 0xD8, 0xFF]),
        "image/png" => data.starts_with(&[0x89, b'P', b'N', b'G']),
        "image/webp" => data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP",
        "application/pdf" => data.starts_with(b"%PDF"),
        _ => false,
    }
}

/// Save an uploaded document under `uploads_dir` with a random name.
pub async fn save_uploaded_file(
    uploads_dir: &str,
    max_bytes: usize,
    filename: &str,
    data: &[u8],
) -> Result<StoredUpload> {
    if data.is_empty() {
        return Err(AppError::Validation("File is empty".to_string()));
    }

    if data.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "File too large (max {} KB)",
            max_bytes / 1024
        )));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .ok_or_else(|| AppError::Validation("Invalid filename".to_string()))?;

    let content_type = content_type_for(&extension).ok_or_else(|| {
        AppError::Validation("Invalid file type. Allowed: JPG, PNG, WebP, PDF".to_string())
    })?;

    if !sniff_matches(content_type, data) {
        return Err(AppError::Validation(
            "File contents do not match its extension".to_string(),
        ));
    }

    let uploads_path = PathBuf::from(uploads_dir);
    fs::create_dir_all(&uploads_path).await.map_err(|e| {
        AppError::Internal(format!("Failed to create uploads directory: {}", e))
    })?;

    let new_filename = format!("{}.{}", Uuid::new_v4().simple(), extension);
    let file_path = uploads_path.join(&new_filename);

    let mut file = fs::File::create(&file_path).await.map_err(|e| {
        AppError::Internal(format!("Failed to create file: {}", e))
    })?;

    file.write_all(data).await.map_err(|e| {
        AppError::Internal(format!("Failed to write file: {}", e))
    })?;

    Ok(StoredUpload {
        url: format!("/uploads/{}", new_filename),
        filename: filename.to_string(),
        size: data.len(),
        content_type: content_type.to_string(),
    })
}
