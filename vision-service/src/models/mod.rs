pub mod upload;

pub use upload::UploadArtifact;
