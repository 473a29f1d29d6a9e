//! `POST /v1/convert/` - upload an FBX model, get back the GLB location.
//!
//! Each request runs strictly in order: the upload is flushed to its task
//! workspace, the converter runs to completion, the upload is removed, and
//! only then is the response sent.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;

use super::error::ApiError;
use super::routes::AppState;
use crate::task::Task;
use crate::upload::{self, MODEL_FIELD};

/// Body of a successful conversion.
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub ok: bool,
    /// Location of the `.glb`, servable as-is under the data root.
    pub path: String,
}

/// The model file once it is on disk.
#[derive(Debug)]
struct StoredUpload {
    task: Task,
    file_name: String,
    size: u64,
}

pub async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ConvertResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::InvalidUpload(e.body_text()))?;
    let StoredUpload {
        task,
        file_name,
        size,
    } = receive_model(&state, multipart).await?;

    info!("Task {}: received {} ({} bytes)", task.id, file_name, size);

    let input = task.input_path(&file_name);
    let output_base = task.output_base(&file_name);
    state.converter.convert(&input, &output_base).await?;

    tokio::fs::remove_file(&input)
        .await
        .map_err(|source| ApiError::Cleanup {
            path: input.clone(),
            source,
        })?;

    let path = task.public_output_path(&file_name);
    info!("Task {}: converted {} -> {}", task.id, file_name, path);

    Ok(Json(ConvertResponse { ok: true, path }))
}

/// Read the multipart body, storing the single `model` file in a fresh task
/// workspace. Plain text fields are skipped; any other file field, or a
/// second model, invalidates the request.
async fn receive_model(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<StoredUpload, ApiError> {
    let mut stored: Option<StoredUpload> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                discard(stored.as_ref()).await;
                return Err(if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    ApiError::TooLarge(e.body_text())
                } else {
                    ApiError::InvalidUpload(e.body_text())
                });
            }
        };

        let field_name = field.name().unwrap_or_default().to_string();
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };

        if field_name != MODEL_FIELD {
            discard(stored.as_ref()).await;
            return Err(ApiError::InvalidUpload(format!(
                "unexpected file field '{}'",
                field_name
            )));
        }
        if stored.is_some() {
            discard(stored.as_ref()).await;
            return Err(ApiError::InvalidUpload(format!(
                "more than one '{}' file",
                MODEL_FIELD
            )));
        }

        // Nothing touches the disk until the name has been checked.
        upload::validate_filename(&file_name)?;

        let task = state.tasks.allocate().await?;
        let dest = task.input_path(&file_name);
        let size = upload::store(field, &dest, state.config.max_upload_bytes).await?;

        stored = Some(StoredUpload {
            task,
            file_name,
            size,
        });
    }

    stored.ok_or_else(|| ApiError::InvalidUpload(format!("missing '{}' file field", MODEL_FIELD)))
}

async fn discard(stored: Option<&StoredUpload>) {
    if let Some(stored) = stored {
        let path = stored.task.input_path(&stored.file_name);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove rejected upload {}: {}", path.display(), e);
            }
        }
    }
}
