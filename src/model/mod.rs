pub mod metadata;
pub mod registry;
pub mod storage;

pub use metadata::ModelMetadata;
pub use registry::{ModelInfo, ModelKind, ModelRegistry};
pub use storage::{load_json_payload, load_model_binary, save_binary_bundle, save_json_bundle};
