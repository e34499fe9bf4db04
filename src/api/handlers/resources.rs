use crate::AppState;
use crate::api::error::AppError;
use crate::services::resources::{Collection, Page, PageQuery};
use crate::utils::auth::Claims;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde_json::Value;
use validator::Validate;

async fn list(
    state: &AppState,
    collection: Collection,
    claims: &Claims,
    query: PageQuery,
) -> Result<Json<Page>, AppError> {
    query
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let page = state.resources.list(collection, &claims.sub, &query).await?;
    Ok(Json(page))
}

async fn detail(
    state: &AppState,
    collection: Collection,
    claims: &Claims,
    id: i32,
) -> Result<Json<Value>, AppError> {
    state
        .resources
        .detail(collection, &claims.sub, id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection.segment(), id)))
}

#[utoipa::path(
    get,
    path = "/importer-api/uploaded-data",
    params(PageQuery),
    responses(
        (status = 200, description = "The user's uploads", body = Page),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "importer-api"
)]
pub async fn list_uploaded_data(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page>, AppError> {
    list(&state, Collection::UploadedData, &claims, query).await
}

#[utoipa::path(
    get,
    path = "/importer-api/uploaded-data/{id}",
    params(("id" = i32, Path, description = "Upload id")),
    responses(
        (status = 200, description = "One upload"),
        (status = 404, description = "Not found")
    ),
    security(("jwt" = [])),
    tag = "importer-api"
)]
pub async fn get_uploaded_data(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    detail(&state, Collection::UploadedData, &claims, id).await
}

#[utoipa::path(
    get,
    path = "/importer-api/uploaded-layers",
    params(PageQuery),
    responses(
        (status = 200, description = "Layers of the user's uploads", body = Page),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "importer-api"
)]
pub async fn list_uploaded_layers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page>, AppError> {
    list(&state, Collection::UploadedLayers, &claims, query).await
}

#[utoipa::path(
    get,
    path = "/importer-api/uploaded-layers/{id}",
    params(("id" = i32, Path, description = "Layer id")),
    responses(
        (status = 200, description = "One layer"),
        (status = 404, description = "Not found")
    ),
    security(("jwt" = [])),
    tag = "importer-api"
)]
pub async fn get_uploaded_layer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    detail(&state, Collection::UploadedLayers, &claims, id).await
}

#[utoipa::path(
    get,
    path = "/importer-api/uploaded-files",
    params(PageQuery),
    responses(
        (status = 200, description = "Files of the user's uploads", body = Page),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = [])),
    tag = "importer-api"
)]
pub async fn list_uploaded_files(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page>, AppError> {
    list(&state, Collection::UploadedFiles, &claims, query).await
}

#[utoipa::path(
    get,
    path = "/importer-api/uploaded-files/{id}",
    params(("id" = i32, Path, description = "File id")),
    responses(
        (status = 200, description = "One file"),
        (status = 404, description = "Not found")
    ),
    security(("jwt" = [])),
    tag = "importer-api"
)]
pub async fn get_uploaded_file(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i32>,
) -> Result<Json<Value>, AppError> {
    detail(&state, Collection::UploadedFiles, &claims, id).await
}
