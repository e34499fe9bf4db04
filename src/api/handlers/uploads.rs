use crate::AppState;
use crate::api::error::AppError;
use crate::api::routes::reverse;
use crate::entities::uploaded_data;
use crate::services::intake::{CandidateFile, IncomingFile, IntakeOutcome};
use crate::services::upload_service::UploadSummary;
use crate::utils::auth::Claims;
use crate::utils::validation::sanitize_filename;
use axum::{
    Extension, Json,
    extract::{Multipart, State},
    response::{Html, IntoResponse, Redirect, Response},
};
use futures::TryStreamExt;
use serde::Serialize;
use tokio_util::io::StreamReader;
use utoipa::ToSchema;

/// Multipart field carrying the uploaded files.
pub const FILE_FIELD: &str = "file";

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub id: i32,
    pub name: Option<String>,
    pub state: String,
    pub size: Option<i64>,
    pub count: usize,
    pub files: Vec<CandidateFile>,
    /// Files that were left out, and why
    pub diagnostics: Vec<String>,
}

/// An upload that passed intake and was recorded.
pub struct AcceptedUpload {
    pub upload: uploaded_data::Model,
    pub files: Vec<CandidateFile>,
    pub diagnostics: Vec<String>,
}

impl From<AcceptedUpload> for UploadResponse {
    fn from(accepted: AcceptedUpload) -> Self {
        Self {
            id: accepted.upload.id,
            name: accepted.upload.name,
            state: accepted.upload.state,
            size: accepted.upload.size,
            count: accepted.files.len(),
            files: accepted.files,
            diagnostics: accepted.diagnostics,
        }
    }
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::PayloadTooLarge("Request body exceeds the maximum allowed limit".to_string())
    } else {
        AppError::BadRequest(err_msg)
    }
}

/// Spools every `file` field of the request. Other fields are ignored.
async fn read_files(multipart: &mut Multipart) -> Result<Vec<IncomingFile>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let original_filename = field.file_name().unwrap_or("unnamed").to_string();
        let filename = sanitize_filename(&original_filename).ok_or_else(|| {
            AppError::BadRequest(format!("Invalid file name: {}", original_filename))
        })?;

        let body_with_io_error = field.map_err(std::io::Error::other);
        let reader = StreamReader::new(body_with_io_error);

        let file = IncomingFile::spool(filename, reader)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to spool upload: {}", e)))?;
        tracing::debug!("Received {} ({} bytes)", file.name(), file.size());
        files.push(file);
    }

    Ok(files)
}

/// Reads, validates and records one upload request.
pub async fn accept_upload(
    state: &AppState,
    multipart: &mut Multipart,
    user_id: Option<&str>,
) -> Result<AcceptedUpload, AppError> {
    let files = match read_files(multipart).await {
        Ok(files) => files,
        Err(e) => {
            // Consume the rest of the stream so the client sees the error, not a reset
            tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            return Err(e);
        }
    };

    if files.is_empty() {
        return Err(AppError::FieldErrors(vec!["No file provided".to_string()]));
    }

    let batch = match state
        .validator
        .validate(files, state.quota.as_ref(), user_id)
        .await?
    {
        IntakeOutcome::Accepted(batch) => batch,
        IntakeOutcome::Rejected(rejected) => {
            tracing::info!(
                "Upload rejected for {}: {}",
                user_id.unwrap_or("anonymous"),
                rejected.messages().join("; ")
            );
            return Err(AppError::FieldErrors(rejected.messages()));
        }
    };

    if batch.files.is_empty() {
        let mut errors = vec!["No importable files were found in the upload".to_string()];
        errors.extend(batch.diagnostics.iter().cloned());
        return Err(AppError::FieldErrors(errors));
    }

    let files = batch.files.clone();
    let diagnostics = batch.diagnostics.clone();
    let upload = state.upload_service.persist(batch, user_id).await?;

    Ok(AcceptedUpload {
        upload,
        files,
        diagnostics,
    })
}

const UPLOAD_FORM: &str = r#"<!doctype html>
<html>
  <head><title>Upload data</title></head>
  <body>
    <h1>Upload data</h1>
    <form method="post" action="/uploads/new" enctype="multipart/form-data">
      <input type="file" name="file" multiple>
      <button type="submit">Upload</button>
    </form>
  </body>
</html>
"#;

#[utoipa::path(
    get,
    path = "/uploads/new",
    responses(
        (status = 200, description = "Upload form", content_type = "text/html"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "uploads"
)]
pub async fn upload_form() -> Html<&'static str> {
    Html(UPLOAD_FORM)
}

#[utoipa::path(
    post,
    path = "/uploads/new",
    request_body(content = Multipart, description = "One or more `file` fields"),
    responses(
        (status = 303, description = "Upload stored, redirects to the upload list"),
        (status = 400, description = "Field errors"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "uploads"
)]
pub async fn upload_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Response, AppError> {
    accept_upload(&state, &mut multipart, Some(&claims.sub)).await?;
    let list = reverse("uploads-list").unwrap_or("/uploads");
    Ok(Redirect::to(list).into_response())
}

#[utoipa::path(
    post,
    path = "/uploads/new/json",
    request_body(content = Multipart, description = "One or more `file` fields"),
    responses(
        (status = 200, description = "Upload stored", body = UploadResponse),
        (status = 400, description = "Field errors"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "uploads"
)]
pub async fn upload_files_json(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let accepted = accept_upload(&state, &mut multipart, Some(&claims.sub)).await?;
    Ok(Json(accepted.into()))
}

#[utoipa::path(
    get,
    path = "/uploads",
    responses(
        (status = 200, description = "The user's uploads, newest first", body = Vec<UploadSummary>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "uploads"
)]
pub async fn list_uploads(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<UploadSummary>>, AppError> {
    let uploads = state.upload_service.list_uploads(&claims.sub).await?;
    Ok(Json(uploads))
}
