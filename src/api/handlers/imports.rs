use super::uploads::{AcceptedUpload, accept_upload};
use crate::AppState;
use crate::api::error::AppError;
use crate::services::upload_service::ImportStatus;
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    response::Html,
};

async fn import_now(state: &AppState, accepted: AcceptedUpload) -> Result<ImportStatus, AppError> {
    let upload_id = accepted.upload.id;
    state.upload_service.schedule_import(upload_id).await?;

    state
        .upload_service
        .import_status(upload_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Upload {} vanished after scheduling", upload_id)))
}

#[utoipa::path(
    post,
    path = "/bulk-import",
    request_body(content = Multipart, description = "One or more `file` fields"),
    responses(
        (status = 200, description = "Upload stored and queued for import", body = ImportStatus),
        (status = 400, description = "Field errors"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("jwt" = [])
    ),
    tag = "imports"
)]
pub async fn bulk_import(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> Result<Json<ImportStatus>, AppError> {
    let accepted = accept_upload(&state, &mut multipart, Some(&claims.sub)).await?;
    Ok(Json(import_now(&state, accepted).await?))
}

const DEMO_PAGE: &str = r#"<!doctype html>
<html>
  <head><title>One-shot import</title></head>
  <body>
    <h1>Upload and import in one step</h1>
    <form method="post" action="/one-shot-demo_file-upload" enctype="multipart/form-data">
      <input type="file" name="file" multiple>
      <button type="submit">Import</button>
    </form>
    <p>Poll <code>/upload-data-import-status/&lt;id&gt;</code> for progress.</p>
  </body>
</html>
"#;

#[utoipa::path(
    get,
    path = "/one-shot-demo",
    responses(
        (status = 200, description = "Demo page", content_type = "text/html")
    ),
    tag = "imports"
)]
pub async fn one_shot_demo() -> Html<&'static str> {
    Html(DEMO_PAGE)
}

#[utoipa::path(
    post,
    path = "/one-shot-demo_file-upload",
    request_body(content = Multipart, description = "One or more `file` fields"),
    responses(
        (status = 200, description = "Upload stored and queued for import", body = ImportStatus),
        (status = 400, description = "Field errors")
    ),
    tag = "imports"
)]
pub async fn one_shot_upload(
    State(state): State<AppState>,
    claims: Option<Extension<Claims>>,
    mut multipart: Multipart,
) -> Result<Json<ImportStatus>, AppError> {
    let user_id = claims.as_ref().map(|Extension(c)| c.sub.as_str());
    let accepted = accept_upload(&state, &mut multipart, user_id).await?;
    Ok(Json(import_now(&state, accepted).await?))
}

#[utoipa::path(
    get,
    path = "/upload-data-import-status/{id}",
    params(
        ("id" = i32, Path, description = "Upload id")
    ),
    responses(
        (status = 200, description = "Import status of every layer", body = ImportStatus),
        (status = 404, description = "No such upload")
    ),
    tag = "imports"
)]
pub async fn import_status(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ImportStatus>, AppError> {
    state
        .upload_service
        .import_status(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Upload {} not found", id)))
}
