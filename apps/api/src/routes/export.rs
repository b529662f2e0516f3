//! Export endpoints. Each request carries the full document payload; the
//! blocking export pipeline runs on the Tokio blocking pool so PDF generation
//! never stalls the async runtime.

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::export::{
    self, filename, DocumentType, PdfGenerationOptions, PdfGenerationResult, Quality,
};
use crate::models::cover_letter::CoverLetterData;
use crate::models::resume::ResumeData;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportResumeRequest {
    pub data: ResumeData,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub document_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct ExportCoverLetterRequest {
    pub data: CoverLetterData,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub document_id: Option<Uuid>,
    #[serde(default)]
    pub user_id: Option<Uuid>,
}

/// POST /api/v1/export/resume
pub async fn export_resume(
    State(state): State<AppState>,
    Json(request): Json<ExportResumeRequest>,
) -> Result<Response, AppError> {
    validate_owner_name(&request.data.profile.name)?;

    let options = PdfGenerationOptions {
        quality: request.quality,
        document_id: request.document_id,
        user_id: request.user_id,
    };
    info!(document_id = ?options.document_id, "Resume export requested");

    let launcher = state.launcher.clone();
    let owner_name = request.data.profile.name.clone();
    let result = tokio::task::spawn_blocking(move || {
        export::generate_resume_pdf_with_retry(launcher.as_ref(), &request.data, &options)
    })
    .await
    .map_err(|e| anyhow::anyhow!("export task panicked: {e}"))??;

    pdf_response(result, &owner_name, DocumentType::Resume)
}

/// POST /api/v1/export/cover-letter
pub async fn export_cover_letter(
    State(state): State<AppState>,
    Json(request): Json<ExportCoverLetterRequest>,
) -> Result<Response, AppError> {
    validate_owner_name(&request.data.profile.name)?;

    let options = PdfGenerationOptions {
        quality: request.quality,
        document_id: request.document_id,
        user_id: request.user_id,
    };
    info!(document_id = ?options.document_id, "Cover letter export requested");

    let launcher = state.launcher.clone();
    let owner_name = request.data.profile.name.clone();
    let result = tokio::task::spawn_blocking(move || {
        export::generate_cover_letter_pdf_with_retry(launcher.as_ref(), &request.data, &options)
    })
    .await
    .map_err(|e| anyhow::anyhow!("export task panicked: {e}"))??;

    pdf_response(result, &owner_name, DocumentType::CoverLetter)
}

fn validate_owner_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(AppError::Validation(
            "profile.name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn pdf_response(
    result: PdfGenerationResult,
    owner_name: &str,
    document_type: DocumentType,
) -> Result<Response, AppError> {
    let download_name = filename::derive_filename(owner_name, document_type);
    let disposition = format!("attachment; filename=\"{download_name}\"");

    let mut response = (StatusCode::OK, result.buffer).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .map_err(|e| anyhow::anyhow!("invalid download filename: {e}"))?,
    );
    headers.insert("x-page-count", HeaderValue::from(result.page_count));
    Ok(response)
}
