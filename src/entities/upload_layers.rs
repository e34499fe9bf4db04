use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const IMPORT_PENDING: &str = "PENDING";

/// A layer found in an uploaded file, and the state of its import.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_layers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub upload_id: Option<i32>,
    pub upload_file_id: Option<i32>,
    #[sea_orm(column_name = "layer_index")]
    pub index: i32,
    pub name: Option<String>,
    pub import_status: Option<String>,
    pub task_id: Option<String>,
    pub feature_count: Option<i32>,
    /// Name of the layer inside its source file
    pub internal_layer_name: Option<String>,
    /// Unique name the layer is published under
    pub layer_name: Option<String>,
    pub layer_type: Option<String>,
}

impl Model {
    pub fn status(&self) -> &str {
        self.import_status.as_deref().unwrap_or("UNKNOWN")
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::uploaded_data::Entity",
        from = "Column::UploadId",
        to = "super::uploaded_data::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    UploadedData,
    #[sea_orm(
        belongs_to = "super::upload_files::Entity",
        from = "Column::UploadFileId",
        to = "super::upload_files::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    UploadFiles,
}

impl Related<super::uploaded_data::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadedData.def()
    }
}

impl Related<super::upload_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadFiles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
