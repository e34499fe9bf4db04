use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_files")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub upload_id: Option<i32>,
    /// Absolute path of the stored file
    pub file: String,
    pub file_type: Option<String>,
    /// Path relative to the upload directory
    pub slug: String,
}

impl Model {
    pub fn name(&self) -> &str {
        self.slug.rsplit('/').next().unwrap_or(&self.slug)
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
    #[sea_orm(has_many = "super::upload_layers::Entity")]
    UploadLayers,
}

impl Related<super::uploaded_data::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadedData.def()
    }
}

impl Related<super::upload_layers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadLayers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
