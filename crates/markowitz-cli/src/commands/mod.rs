pub mod analyze;
pub mod optimize;
