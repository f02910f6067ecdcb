use axum::{
    extract::{Multipart, State},
    Extension,
    Json,
};

use crate::{
    api::{middleware::auth::CurrentUser, state::AppState},
    error::{AppError, Result},
    uploads::{save_uploaded_file, StoredUpload},
};

pub async fn upload(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<StoredUpload>> {
    let server = &state.settings.server;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        if filename.is_empty() {
            return Err(AppError::BadRequest("No file uploaded".to_string()));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let stored = save_uploaded_file(&server.uploads_dir, server.max_upload_bytes, &filename, &data).await?;
        tracing::info!("{} uploaded {} ({} bytes)", current.user.email, stored.url, stored.size);
        return Ok(Json(stored));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}
