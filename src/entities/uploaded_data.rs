use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const STATE_UPLOADED: &str = "UPLOADED";
pub const STATE_QUEUED: &str = "QUEUED";
pub const STATE_INVALID: &str = "INVALID";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "uploaded_data")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Option<String>,
    pub state: String,
    pub date: DateTimeUtc,
    pub upload_dir: Option<String>,
    pub name: Option<String>,
    #[sea_orm(default_value = false)]
    pub complete: bool,
    pub size: Option<i64>,
    #[sea_orm(column_type = "Text", nullable)]
    pub metadata: Option<String>,
    pub file_type: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::upload_files::Entity")]
    UploadFiles,
    #[sea_orm(has_many = "super::upload_layers::Entity")]
    UploadLayers,
}

impl Related<super::upload_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadFiles.def()
    }
}

impl Related<super::upload_layers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UploadLayers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
