pub mod matcher;
pub mod model;
pub mod store;

pub use matcher::{
    euclidean_distance, identify, min_distance, verify, verify_detailed, MatchResult,
    VerificationDecision,
};

pub use model::{ensure_valid_features, validate_subject_id, SubjectId, Template};

pub use store::{
    check_dimension, read_template_table, write_template_table, CsvTemplateStore,
    MemoryTemplateStore, TemplateStore,
};
