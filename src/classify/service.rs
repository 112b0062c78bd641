use crate::{
    classify::{InferencePipeline, LabelTable, Prediction},
    image::ImageLoader,
    models::{ModelHandle, ModelLoader, ModelStats},
    utils::error::ClassifyError,
    Config, Result,
};
use std::sync::Arc;

/// 对外边界：HTTP 层通过它调用分类流水线
///
/// 模型加载失败时服务进入降级状态，所有预测请求返回 `ServiceUnavailable`。
#[derive(Clone)]
pub struct ClassifierService {
    pipeline: Option<Arc<InferencePipeline>>,
    labels: Arc<LabelTable>,
}

impl ClassifierService {
    /// 启动时构建。标签文件错误直接返回，模型加载错误只导致降级。
    pub fn from_config(config: &Config) -> Result<Self> {
        let labels = match &config.labels_path {
            Some(path) => LabelTable::from_path(path)?,
            None => LabelTable::butterflies(),
        };
        tracing::info!("Label table loaded: {} classes", labels.len());

        match ModelLoader::new().load(config) {
            Ok(handle) => {
                tracing::info!("Model loaded successfully with custom layers");
                Ok(Self::ready(handle, labels))
            }
            Err(e) => {
                tracing::error!("Failed to load model: {}", e);
                tracing::warn!("Service running in degraded mode, predictions will be rejected");
                Ok(Self::degraded(labels))
            }
        }
    }

    pub fn ready(handle: ModelHandle, labels: LabelTable) -> Self {
        let labels = Arc::new(labels);
        let pipeline = InferencePipeline::new(Arc::new(handle), Arc::clone(&labels));
        Self {
            pipeline: Some(Arc::new(pipeline)),
            labels,
        }
    }

    pub fn degraded(labels: LabelTable) -> Self {
        Self {
            pipeline: None,
            labels: Arc::new(labels),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.pipeline.is_some()
    }

    pub fn ensure_ready(&self) -> Result<&InferencePipeline> {
        self.pipeline.as_deref().ok_or_else(|| {
            tracing::error!("Model is not loaded");
            ClassifyError::ServiceUnavailable
        })
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn model_stats(&self) -> Option<ModelStats> {
        self.pipeline.as_ref().map(|p| p.handle().stats())
    }

    /// 阻塞调用，异步上下文中应放到 `spawn_blocking` 中执行
    pub fn predict(&self, image_bytes: &[u8], filename: &str) -> Result<Prediction> {
        let pipeline = self.ensure_ready()?;

        if image_bytes.is_empty() {
            return Err(ClassifyError::NoInputProvided("Empty file".to_string()));
        }
        if filename.trim().is_empty() {
            return Err(ClassifyError::NoInputProvided("Invalid file name".to_string()));
        }
        ImageLoader::check_size(image_bytes.len())?;

        pipeline.infer(image_bytes, filename)
    }
}
