//! Read-only REST collections over the upload records.
//!
//! Two backends share one contract: the standard one, and a GeoNode flavour
//! that links layers to their published pages. One is picked at startup.

use crate::config::ImporterConfig;
use crate::entities::{prelude::*, *};
use anyhow::Result;
use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

pub const API_PREFIX: &str = "/importer-api";
pub const DEFAULT_LIMIT: u64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    UploadedData,
    UploadedLayers,
    UploadedFiles,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::UploadedData,
        Collection::UploadedLayers,
        Collection::UploadedFiles,
    ];

    pub fn segment(&self) -> &'static str {
        match self {
            Collection::UploadedData => "uploaded-data",
            Collection::UploadedLayers => "uploaded-layers",
            Collection::UploadedFiles => "uploaded-files",
        }
    }

    pub fn resource_uri(&self, id: i32) -> String {
        format!("{}/{}/{}/", API_PREFIX, self.segment(), id)
    }
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl PageQuery {
    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn offset(&self) -> u64 {
        self.offset.unwrap_or(0)
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PageMeta {
    pub limit: u64,
    pub offset: u64,
    pub total_count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Page {
    pub meta: PageMeta,
    #[schema(value_type = Vec<Object>)]
    pub objects: Vec<Value>,
}

#[async_trait]
pub trait ImporterResources: Send + Sync {
    fn backend(&self) -> &'static str;

    /// One page of the user's objects.
    async fn list(&self, collection: Collection, user_id: &str, page: &PageQuery)
    -> Result<Page>;

    async fn detail(&self, collection: Collection, user_id: &str, id: i32)
    -> Result<Option<Value>>;
}

pub struct StandardResources {
    db: DatabaseConnection,
}

impl StandardResources {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn uploads(
        &self,
        user_id: &str,
        id: Option<i32>,
        page: &PageQuery,
    ) -> Result<(u64, Vec<uploaded_data::Model>)> {
        let mut select = UploadedData::find().filter(uploaded_data::Column::UserId.eq(user_id));
        if let Some(id) = id {
            select = select.filter(uploaded_data::Column::Id.eq(id));
        }

        let total = select.clone().count(&self.db).await?;
        let rows = select
            .order_by_desc(uploaded_data::Column::Date)
            .order_by_desc(uploaded_data::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;
        Ok((total, rows))
    }

    async fn layers(
        &self,
        user_id: &str,
        id: Option<i32>,
        page: &PageQuery,
    ) -> Result<(u64, Vec<upload_layers::Model>)> {
        let mut select = UploadLayers::find()
            .inner_join(UploadedData)
            .filter(uploaded_data::Column::UserId.eq(user_id));
        if let Some(id) = id {
            select = select.filter(upload_layers::Column::Id.eq(id));
        }

        let total = select.clone().count(&self.db).await?;
        let rows = select
            .order_by_asc(upload_layers::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;
        Ok((total, rows))
    }

    async fn files(
        &self,
        user_id: &str,
        id: Option<i32>,
        page: &PageQuery,
    ) -> Result<(u64, Vec<upload_files::Model>)> {
        let mut select = UploadFiles::find()
            .inner_join(UploadedData)
            .filter(uploaded_data::Column::UserId.eq(user_id));
        if let Some(id) = id {
            select = select.filter(upload_files::Column::Id.eq(id));
        }

        let total = select.clone().count(&self.db).await?;
        let rows = select
            .order_by_asc(upload_files::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;
        Ok((total, rows))
    }

    /// Layers belonging to the given uploads.
    async fn layers_of(&self, upload_ids: Vec<i32>) -> Result<Vec<upload_layers::Model>> {
        Ok(UploadLayers::find()
            .filter(upload_layers::Column::UploadId.is_in(upload_ids))
            .order_by_asc(upload_layers::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn objects(
        &self,
        collection: Collection,
        user_id: &str,
        id: Option<i32>,
        page: &PageQuery,
    ) -> Result<(u64, Vec<Value>)> {
        Ok(match collection {
            Collection::UploadedData => {
                let (total, rows) = self.uploads(user_id, id, page).await?;
                (total, rows.iter().map(upload_object).collect())
            }
            Collection::UploadedLayers => {
                let (total, rows) = self.layers(user_id, id, page).await?;
                (total, rows.iter().map(layer_object).collect())
            }
            Collection::UploadedFiles => {
                let (total, rows) = self.files(user_id, id, page).await?;
                (total, rows.iter().map(file_object).collect())
            }
        })
    }
}

#[async_trait]
impl ImporterResources for StandardResources {
    fn backend(&self) -> &'static str {
        "standard"
    }

    async fn list(
        &self,
        collection: Collection,
        user_id: &str,
        page: &PageQuery,
    ) -> Result<Page> {
        let (total_count, objects) = self.objects(collection, user_id, None, page).await?;
        Ok(Page {
            meta: PageMeta {
                limit: page.limit(),
                offset: page.offset(),
                total_count,
            },
            objects,
        })
    }

    async fn detail(
        &self,
        collection: Collection,
        user_id: &str,
        id: i32,
    ) -> Result<Option<Value>> {
        let (_, objects) = self
            .objects(collection, user_id, Some(id), &PageQuery::default())
            .await?;
        Ok(objects.into_iter().next())
    }
}

fn upload_object(upload: &uploaded_data::Model) -> Value {
    json!({
        "id": upload.id,
        "name": upload.name,
        "state": upload.state,
        "date": upload.date,
        "size": upload.size,
        "file_type": upload.file_type,
        "complete": upload.complete,
        "resource_uri": Collection::UploadedData.resource_uri(upload.id),
    })
}

fn layer_object(layer: &upload_layers::Model) -> Value {
    json!({
        "id": layer.id,
        "name": layer.name,
        "status": layer.status(),
        "task_id": layer.task_id,
        "feature_count": layer.feature_count,
        "layer_name": layer.layer_name,
        "layer_type": layer.layer_type,
        "upload": layer.upload_id.map(|id| Collection::UploadedData.resource_uri(id)),
        "resource_uri": Collection::UploadedLayers.resource_uri(layer.id),
    })
}

fn file_object(file: &upload_files::Model) -> Value {
    json!({
        "id": file.id,
        "name": file.name(),
        "file_type": file.file_type,
        "slug": file.slug,
        "upload": file.upload_id.map(|id| Collection::UploadedData.resource_uri(id)),
        "resource_uri": Collection::UploadedFiles.resource_uri(file.id),
    })
}

/// Standard collections plus links into a GeoNode site.
pub struct GeoNodeResources {
    inner: StandardResources,
    workspace: String,
}

impl GeoNodeResources {
    pub fn new(db: DatabaseConnection, workspace: impl Into<String>) -> Self {
        Self {
            inner: StandardResources::new(db),
            workspace: workspace.into(),
        }
    }

    fn link_layer(&self, mut layer: Value) -> Value {
        let url = layer
            .get("layer_name")
            .and_then(Value::as_str)
            .map(|name| format!("/layers/{}:{}", self.workspace, name));
        if let (Some(url), Some(obj)) = (url, layer.as_object_mut()) {
            obj.insert("detail_url".to_string(), Value::String(url));
        }
        layer
    }

    async fn nest_layers(&self, mut uploads: Vec<Value>) -> Result<Vec<Value>> {
        let ids: Vec<i32> = uploads
            .iter()
            .filter_map(|u| u.get("id").and_then(Value::as_i64))
            .map(|id| id as i32)
            .collect();
        let layers = self.inner.layers_of(ids).await?;

        for upload in &mut uploads {
            let id = upload.get("id").and_then(Value::as_i64).map(|id| id as i32);
            let nested: Vec<Value> = layers
                .iter()
                .filter(|l| l.upload_id.is_some() && l.upload_id == id)
                .map(|l| self.link_layer(layer_object(l)))
                .collect();
            if let Some(obj) = upload.as_object_mut() {
                obj.insert("layers".to_string(), Value::Array(nested));
            }
        }
        Ok(uploads)
    }

    async fn decorate(&self, collection: Collection, objects: Vec<Value>) -> Result<Vec<Value>> {
        match collection {
            Collection::UploadedData => self.nest_layers(objects).await,
            Collection::UploadedLayers => {
                Ok(objects.into_iter().map(|l| self.link_layer(l)).collect())
            }
            Collection::UploadedFiles => Ok(objects),
        }
    }
}

#[async_trait]
impl ImporterResources for GeoNodeResources {
    fn backend(&self) -> &'static str {
        "geonode"
    }

    async fn list(
        &self,
        collection: Collection,
        user_id: &str,
        page: &PageQuery,
    ) -> Result<Page> {
        let mut page = self.inner.list(collection, user_id, page).await?;
        page.objects = self.decorate(collection, page.objects).await?;
        Ok(page)
    }

    async fn detail(
        &self,
        collection: Collection,
        user_id: &str,
        id: i32,
    ) -> Result<Option<Value>> {
        let Some(object) = self.inner.detail(collection, user_id, id).await? else {
            return Ok(None);
        };
        Ok(self.decorate(collection, vec![object]).await?.into_iter().next())
    }
}

pub fn create_resources(
    config: &ImporterConfig,
    db: DatabaseConnection,
) -> Arc<dyn ImporterResources> {
    if config.geonode_enabled {
        tracing::info!(
            "Using GeoNode importer resources (workspace '{}')",
            config.geonode_workspace
        );
        Arc::new(GeoNodeResources::new(db, config.geonode_workspace.clone()))
    } else {
        Arc::new(StandardResources::new(db))
    }
}
