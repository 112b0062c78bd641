pub mod labels;
pub mod pipeline;
pub mod service;
pub mod types;

pub use labels::{LabelTable, BUTTERFLY_NAMES, UNKNOWN_LABEL};
pub use pipeline::InferencePipeline;
pub use service::ClassifierService;
pub use types::Prediction;
