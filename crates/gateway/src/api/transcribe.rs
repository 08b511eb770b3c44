//! `POST /transcribe`: multipart `file` in, `{ "text": ... }` out.
//!
//! The recognised text goes through the transcript filter; rejected text
//! comes back as `""`.

use axum::extract::{Multipart, State};
use axum::{Extension, Json};
use serde_json::{json, Value};

use lt_domain::principal::Principal;
use lt_providers::AudioUpload;

use crate::error::ApiError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

pub async fn transcribe(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let speech = state
        .speech
        .clone()
        .ok_or_else(|| ApiError::Unavailable("La transcripción no está disponible".into()))?;
    let max_bytes = state.config.transcription.max_upload_bytes;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Formulario inválido: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("audio.webm").to_owned();
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Formulario inválido: {e}")))?;
        upload = Some(AudioUpload {
            bytes: bytes.to_vec(),
            file_name,
            content_type,
        });
        break;
    }

    let upload = upload
        .filter(|u| !u.bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No se encontró el archivo de audio".into()))?;
    if upload.bytes.len() > max_bytes {
        return Err(ApiError::BadRequest("El archivo de audio es demasiado grande".into()));
    }

    tracing::debug!(user_id = %principal.id, bytes = upload.bytes.len(), "transcribing audio");
    let raw = speech.transcribe(upload).await?;
    let text = state.transcript_filter.filter(&raw);

    Ok(Json(json!({ "text": text })))
}
