pub mod app;
pub mod upload;

pub use app::{health_check, index, metrics, readiness_check};
pub use upload::upload_image;
