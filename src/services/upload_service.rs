use crate::entities::{prelude::*, *};
use crate::services::intake::{CandidateFile, ImportBatch};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use utoipa::ToSchema;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 250;

/// Extensions whose files carry layers of their own. Sidecars, styles and
/// metadata only accompany them.
const LAYER_SOURCES: &[&str] = &[
    "shp", "geojson", "json", "kml", "gpkg", "csv", "tif", "tiff", "jp2", "j2k", "ntf", "nitf",
];

/// General kind of a stored file.
pub fn file_type_for(extension: &str) -> Option<&'static str> {
    match extension {
        "tif" | "tiff" | "jp2" | "j2k" | "ntf" | "nitf" => Some("raster"),
        "sld" => Some("style"),
        "xml" => None,
        _ => Some("vector"),
    }
}

#[derive(Serialize, ToSchema, Debug)]
pub struct LayerStatus {
    pub id: i32,
    pub name: Option<String>,
    pub status: String,
    pub task_id: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct UploadSummary {
    pub id: i32,
    pub name: Option<String>,
    pub state: String,
    pub date: DateTime<Utc>,
    pub size: Option<i64>,
    pub file_type: Option<String>,
    pub complete: bool,
    pub files: Vec<String>,
    pub layers: Vec<LayerStatus>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct ImportStatus {
    pub id: i32,
    pub state: String,
    pub complete: bool,
    pub layers: Vec<LayerStatus>,
}

pub struct UploadService {
    db: DatabaseConnection,
}

impl UploadService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records an accepted batch with its files and layers.
    ///
    /// The staging directory becomes the upload directory once the
    /// transaction commits; on any failure it is removed with the batch.
    pub async fn persist(
        &self,
        batch: ImportBatch,
        user_id: Option<&str>,
    ) -> Result<uploaded_data::Model> {
        let upload_dir = batch.staging_path().to_string_lossy().into_owned();
        let name = upload_name(&batch.files);
        let file_type = batch
            .files
            .iter()
            .find(|f| is_layer_source(&f.extension))
            .and_then(|f| file_type_for(&f.extension))
            .map(|t| t.to_string());

        let size = size_column(batch.total_size)?;
        let txn = self.db.begin().await?;

        let upload = uploaded_data::ActiveModel {
            user_id: Set(user_id.map(|u| u.to_string())),
            state: Set(uploaded_data::STATE_UPLOADED.to_string()),
            date: Set(Utc::now()),
            upload_dir: Set(Some(upload_dir)),
            name: Set(Some(name)),
            complete: Set(true),
            size: Set(Some(size)),
            metadata: Set(None),
            file_type: Set(file_type),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for file in &batch.files {
            let stored = upload_files::ActiveModel {
                upload_id: Set(Some(upload.id)),
                file: Set(batch.path_of(file).to_string_lossy().into_owned()),
                file_type: Set(file_type_for(&file.extension).map(|t| t.to_string())),
                slug: Set(slug_of(&file.relative_path)),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            if is_layer_source(&file.extension) {
                let stem = file.stem().to_string();
                upload_layers::ActiveModel {
                    upload_id: Set(Some(upload.id)),
                    upload_file_id: Set(Some(stored.id)),
                    index: Set(0),
                    name: Set(Some(stem.clone())),
                    internal_layer_name: Set(Some(stem)),
                    layer_type: Set(stored.file_type.clone()),
                    ..Default::default()
                }
                .insert(&txn)
                .await?;
            }
        }

        txn.commit().await?;

        let (kept, files, _) = batch.keep();
        tracing::info!(
            "Stored upload {} ({} files) in {}",
            upload.id,
            files.len(),
            kept.display()
        );

        Ok(upload)
    }

    /// Marks every layer of the upload as pending import.
    pub async fn schedule_import(&self, upload_id: i32) -> Result<Vec<upload_layers::Model>> {
        let txn = self.db.begin().await?;

        let layers = UploadLayers::find()
            .filter(upload_layers::Column::UploadId.eq(upload_id))
            .order_by_asc(upload_layers::Column::Id)
            .all(&txn)
            .await?;

        let mut scheduled = Vec::with_capacity(layers.len());
        for layer in layers {
            let mut active: upload_layers::ActiveModel = layer.into();
            active.import_status = Set(Some(upload_layers::IMPORT_PENDING.to_string()));
            active.task_id = Set(Some(Uuid::new_v4().to_string()));
            scheduled.push(active.update(&txn).await?);
        }

        if let Some(upload) = UploadedData::find_by_id(upload_id).one(&txn).await? {
            let mut active: uploaded_data::ActiveModel = upload.into();
            active.state = Set(uploaded_data::STATE_QUEUED.to_string());
            active.update(&txn).await?;
        }

        txn.commit().await?;

        tracing::info!("Queued {} layers of upload {}", scheduled.len(), upload_id);
        Ok(scheduled)
    }

    /// The user's uploads, newest first.
    pub async fn list_uploads(&self, user_id: &str) -> Result<Vec<UploadSummary>> {
        let uploads = UploadedData::find()
            .filter(uploaded_data::Column::UserId.eq(user_id))
            .order_by_desc(uploaded_data::Column::Date)
            .order_by_desc(uploaded_data::Column::Id)
            .all(&self.db)
            .await?;

        let ids: Vec<i32> = uploads.iter().map(|u| u.id).collect();
        let files = UploadFiles::find()
            .filter(upload_files::Column::UploadId.is_in(ids.clone()))
            .order_by_asc(upload_files::Column::Id)
            .all(&self.db)
            .await?;
        let layers = UploadLayers::find()
            .filter(upload_layers::Column::UploadId.is_in(ids))
            .order_by_asc(upload_layers::Column::Id)
            .all(&self.db)
            .await?;

        Ok(uploads
            .into_iter()
            .map(|upload| {
                let own_files: Vec<&upload_files::Model> = files
                    .iter()
                    .filter(|f| f.upload_id == Some(upload.id))
                    .collect();
                let own_layers: Vec<&upload_layers::Model> = layers
                    .iter()
                    .filter(|l| l.upload_id == Some(upload.id))
                    .collect();

                UploadSummary {
                    id: upload.id,
                    files: own_files.iter().map(|f| f.name().to_string()).collect(),
                    layers: layer_statuses(&own_layers, &own_files),
                    name: upload.name,
                    state: upload.state,
                    date: upload.date,
                    size: upload.size,
                    file_type: upload.file_type,
                    complete: upload.complete,
                }
            })
            .collect())
    }

    pub async fn import_status(&self, upload_id: i32) -> Result<Option<ImportStatus>> {
        let Some(upload) = UploadedData::find_by_id(upload_id).one(&self.db).await? else {
            return Ok(None);
        };

        let files = UploadFiles::find()
            .filter(upload_files::Column::UploadId.eq(upload_id))
            .all(&self.db)
            .await?;
        let layers = UploadLayers::find()
            .filter(upload_layers::Column::UploadId.eq(upload_id))
            .order_by_asc(upload_layers::Column::Id)
            .all(&self.db)
            .await?;

        let files: Vec<&upload_files::Model> = files.iter().collect();
        let layers: Vec<&upload_layers::Model> = layers.iter().collect();

        Ok(Some(ImportStatus {
            id: upload.id,
            state: upload.state,
            complete: upload.complete,
            layers: layer_statuses(&layers, &files),
        }))
    }
}

fn layer_statuses(
    layers: &[&upload_layers::Model],
    files: &[&upload_files::Model],
) -> Vec<LayerStatus> {
    let names: HashMap<i32, &str> = files.iter().map(|f| (f.id, f.name())).collect();

    layers
        .iter()
        .map(|layer| LayerStatus {
            id: layer.id,
            name: layer.name.clone(),
            status: layer.status().to_string(),
            task_id: layer.task_id.clone(),
            file_name: layer
                .upload_file_id
                .and_then(|id| names.get(&id))
                .map(|n| n.to_string()),
        })
        .collect()
}

fn is_layer_source(extension: &str) -> bool {
    LAYER_SOURCES.contains(&extension)
}

fn slug_of(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Comma separated basenames, cut to fit the name column.
fn upload_name(files: &[CandidateFile]) -> String {
    let joined = files
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    if joined.len() <= MAX_NAME_LEN {
        return joined;
    }
    let mut end = MAX_NAME_LEN;
    while !joined.is_char_boundary(end) {
        end -= 1;
    }
    joined[..end].to_string()
}

/// Byte counts are stored in a signed column.
fn size_column(bytes: u64) -> Result<i64> {
    i64::try_from(bytes).with_context(|| format!("Upload size {} bytes is out of range", bytes))
}
