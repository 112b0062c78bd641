pub mod classify;
pub mod config;
pub mod image;
pub mod models;
pub mod utils;
pub mod web;

// 重新导出主要类型
pub use classify::{ClassifierService, LabelTable, Prediction};
pub use config::Config;
pub use utils::error::{ClassifyError, ErrorKind};

pub type Result<T> = std::result::Result<T, ClassifyError>;
