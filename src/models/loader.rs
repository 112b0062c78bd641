use crate::models::backend::{InferenceBackend, OnnxBackend};
use crate::models::handle::ModelHandle;
use crate::models::manifest::ModelManifest;
use crate::models::registry::{LayerRegistry, PreprocessingLayer};
use crate::utils::error::ClassifyError;
use crate::{Config, Result};

/// 模型加载器
///
/// 读取清单，按注册表解析预处理层，再构建 ONNX 会话。
/// 所有失败都归为 `ModelLoad`，由调用方决定降级运行。
pub struct ModelLoader {
    registry: LayerRegistry,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_registry(LayerRegistry::with_augmentation_layers())
    }

    pub fn with_registry(registry: LayerRegistry) -> Self {
        Self { registry }
    }

    pub fn load(&self, config: &Config) -> Result<ModelHandle> {
        tracing::info!("Loading model manifest from: {}", config.manifest_path.display());

        let result = ModelManifest::from_path(&config.manifest_path).and_then(|manifest| {
            // 先解析预处理层，未知层无需加载整个计算图即可失败
            let layers = self.registry.resolve_all(&manifest.preprocessing)?;
            let backend = OnnxBackend::from_file(
                &config.model_path,
                &config.onnx_config,
                manifest.input_name.as_deref(),
                manifest.output_name.as_deref(),
            )?;
            Self::build(&manifest, Box::new(backend), layers)
        });

        result.map_err(into_model_load)
    }

    /// 使用给定后端构建模型句柄，层解析规则与 `load` 相同
    pub fn load_with_backend(
        &self,
        manifest: &ModelManifest,
        backend: Box<dyn InferenceBackend>,
    ) -> Result<ModelHandle> {
        let layers = self
            .registry
            .resolve_all(&manifest.preprocessing)
            .map_err(into_model_load)?;

        Self::build(manifest, backend, layers).map_err(into_model_load)
    }

    fn build(
        manifest: &ModelManifest,
        backend: Box<dyn InferenceBackend>,
        layers: Vec<Box<dyn PreprocessingLayer>>,
    ) -> Result<ModelHandle> {
        let handle = ModelHandle::new(manifest, backend, layers)?;

        let shape = handle.input_shape();
        tracing::info!(
            "Model '{}' loaded: input={}x{}x{}, classes={}, rescale=1/{}, preprocessing layers={}",
            handle.name(),
            shape.height,
            shape.width,
            shape.channels,
            handle.num_classes(),
            handle.rescale_divisor(),
            manifest.preprocessing.len()
        );

        Ok(handle)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn into_model_load(err: ClassifyError) -> ClassifyError {
    match err {
        ClassifyError::ModelLoad(_) => err,
        other => ClassifyError::ModelLoad(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array4, ArrayD};
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct Uniform;

    impl InferenceBackend for Uniform {
        fn run(&self, _batch: Array4<f32>) -> Result<ArrayD<f32>> {
            Ok(ArrayD::from_elem(vec![1, 2], 0.5))
        }

        fn describe(&self) -> String {
            "uniform".to_string()
        }
    }

    fn manifest_with(layer: &str) -> ModelManifest {
        ModelManifest::parse(&format!(
            r#"{{
                "input_shape": [8, 8, 3],
                "num_classes": 2,
                "rescale_divisor": 255.0,
                "preprocessing": [{{"class_name": "{}", "config": {{"factor": 0.1}}}}]
            }}"#,
            layer
        ))
        .unwrap()
    }

    fn config_for(model: &std::path::Path, manifest: &std::path::Path) -> Config {
        Config::new(
            "127.0.0.1:0".to_string(),
            model,
            Some(manifest.to_path_buf()),
            None,
            std::env::temp_dir(),
            Some(1),
            false,
        )
        .unwrap()
    }

    #[test]
    fn resolves_registered_layers() {
        let handle = ModelLoader::new()
            .load_with_backend(&manifest_with("RandomRotation"), Box::new(Uniform))
            .unwrap();
        assert_eq!(handle.stats().preprocessing_layers.len(), 1);
    }

    #[test]
    fn unknown_layer_is_model_load_failure() {
        let err = ModelLoader::new()
            .load_with_backend(&manifest_with("RandomBrightness"), Box::new(Uniform))
            .unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad(msg) if msg.contains("RandomBrightness")));
    }

    #[test]
    fn missing_manifest_is_model_load_failure() {
        let config = config_for(
            std::path::Path::new("/nonexistent/model.onnx"),
            std::path::Path::new("/nonexistent/model.json"),
        );
        let err = ModelLoader::new().load(&config).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad(_)));
    }

    #[test]
    fn corrupt_manifest_is_model_load_failure() {
        let mut manifest = NamedTempFile::new().unwrap();
        write!(manifest, "{{ not json").unwrap();

        let config = config_for(std::path::Path::new("/nonexistent/model.onnx"), manifest.path());
        let err = ModelLoader::new().load(&config).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad(msg) if msg.contains("Invalid model manifest")));
    }

    #[test]
    fn missing_model_file_is_model_load_failure() {
        let mut manifest = NamedTempFile::new().unwrap();
        write!(
            manifest,
            r#"{{"input_shape": [224, 224, 3], "num_classes": 75, "rescale_divisor": 255.0}}"#
        )
        .unwrap();

        let config = config_for(std::path::Path::new("/nonexistent/model.onnx"), manifest.path());
        let err = ModelLoader::new().load(&config).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad(msg) if msg.contains("not found")));
    }

    #[test]
    fn unknown_layer_fails_before_model_file_is_read() {
        let mut manifest = NamedTempFile::new().unwrap();
        write!(
            manifest,
            r#"{{
                "input_shape": [224, 224, 3],
                "num_classes": 75,
                "rescale_divisor": 255.0,
                "preprocessing": [{{"class_name": "RandomBrightness", "config": {{"factor": 0.2}}}}]
            }}"#
        )
        .unwrap();

        let config = config_for(std::path::Path::new("/nonexistent/model.onnx"), manifest.path());
        let err = ModelLoader::new().load(&config).unwrap_err();
        assert!(
            matches!(&err, ClassifyError::ModelLoad(msg) if msg.contains("RandomBrightness") && !msg.contains("not found")),
            "{err:?}"
        );
    }

    #[test]
    fn corrupt_model_file_is_model_load_failure() {
        let mut manifest = NamedTempFile::new().unwrap();
        write!(
            manifest,
            r#"{{"input_shape": [224, 224, 3], "num_classes": 75, "rescale_divisor": 255.0}}"#
        )
        .unwrap();
        let mut model = NamedTempFile::new().unwrap();
        model.write_all(b"definitely not an onnx graph").unwrap();

        let config = config_for(model.path(), manifest.path());
        let err = ModelLoader::new().load(&config).unwrap_err();
        assert!(matches!(err, ClassifyError::ModelLoad(_)));
    }
}
