pub mod prelude;

pub mod upload_files;
pub mod upload_layers;
pub mod uploaded_data;
