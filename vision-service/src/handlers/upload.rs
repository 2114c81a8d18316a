use crate::models::UploadArtifact;
use crate::startup::AppState;
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

pub const MISSING_IMAGE_MESSAGE: &str = "No image uploaded";

#[derive(Debug, Serialize, Deserialize)]
pub struct DescriptionResponse {
    pub description: String,
}

fn missing_image() -> AppError {
    AppError::BadRequest(anyhow::anyhow!(MISSING_IMAGE_MESSAGE))
}

/// Map a multipart stream failure onto the status axum assigns it.
fn unreadable_image(err: MultipartError) -> AppError {
    let message = format!("Failed to read image: {}", err.body_text());
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(message)
    } else {
        AppError::BadRequest(anyhow::anyhow!(message))
    }
}

pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DescriptionResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::debug!(error = %e, "Upload request is not multipart");
        missing_image()
    })?;

    let upload = read_image_field(&mut multipart)
        .await?
        .ok_or_else(missing_image)?;

    tracing::info!(
        file_name = %upload.file_name,
        content_type = upload.content_type.as_deref().unwrap_or("-"),
        size = upload.len(),
        "Image upload received"
    );

    let description = state.relay.describe(&upload).await?;

    Ok(Json(DescriptionResponse { description }))
}

/// Find the first `image` file part and read it fully.
///
/// Other fields, and plain text fields named `image`, are skipped. A file
/// part with neither a filename nor content is what browsers send when no
/// file was chosen, so it counts as absent. Hitting the body limit is
/// reported as such rather than as a missing image.
async fn read_image_field(multipart: &mut Multipart) -> Result<Option<UploadArtifact>, AppError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                return Err(unreadable_image(e));
            }
            Err(e) => {
                tracing::debug!(error = %e.body_text(), "Malformed multipart body");
                return Ok(None);
            }
        };

        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let Some(file_name) = field.file_name().map(str::to_string) else {
            tracing::debug!("Skipping `image` field without a filename");
            continue;
        };
        let content_type = field.content_type().map(str::to_string);

        let data = field.bytes().await.map_err(unreadable_image)?;

        if data.is_empty() && file_name.is_empty() {
            return Ok(None);
        }

        return Ok(Some(UploadArtifact::new(
            Some(&file_name),
            content_type.as_deref(),
            data,
        )));
    }
}
