pub mod backend;
pub mod handle;
pub mod loader;
pub mod manifest;
pub mod registry;

pub use backend::{InferenceBackend, OnnxBackend};
pub use handle::{InputShape, ModelHandle, ModelStats};
pub use loader::ModelLoader;
pub use manifest::{Interpolation, ModelManifest, TensorLayout};
pub use registry::{LayerRegistry, LayerSpec, PreprocessingLayer};
