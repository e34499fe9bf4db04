pub mod health;
pub mod imports;
pub mod resources;
pub mod uploads;
