pub mod loader;
pub mod postprocessing;
pub mod preprocessing;

pub use loader::ImageLoader;
pub use postprocessing::ResultFormatter;
pub use preprocessing::ImagePreprocessor;
