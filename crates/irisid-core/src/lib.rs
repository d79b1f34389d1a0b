pub mod enrollment;
pub mod errors;
pub mod extractor;
pub mod recognition;
pub mod segmentation;
pub mod templates;
