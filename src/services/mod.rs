pub mod inspector;
pub mod intake;
pub mod quota;
pub mod resources;
pub mod upload_service;
