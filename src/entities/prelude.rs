pub use super::upload_files::Entity as UploadFiles;
pub use super::upload_layers::Entity as UploadLayers;
pub use super::uploaded_data::Entity as UploadedData;
