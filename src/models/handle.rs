use crate::models::backend::InferenceBackend;
use crate::models::manifest::{Interpolation, ModelManifest, TensorLayout};
use crate::models::registry::PreprocessingLayer;
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::Array4;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

/// 已加载的分类模型
///
/// 启动时构建一次，之后只读。所有推理请求通过 `Arc<ModelHandle>` 共享。
pub struct ModelHandle {
    name: String,
    backend: Box<dyn InferenceBackend>,
    layers: Vec<Box<dyn PreprocessingLayer>>,
    input_shape: InputShape,
    num_classes: usize,
    rescale_divisor: f32,
    layout: TensorLayout,
    interpolation: Interpolation,
}

impl ModelHandle {
    pub fn new(
        manifest: &ModelManifest,
        backend: Box<dyn InferenceBackend>,
        layers: Vec<Box<dyn PreprocessingLayer>>,
    ) -> Result<Self> {
        manifest.validate()?;

        let [height, width, channels] = manifest.input_shape;

        Ok(Self {
            name: manifest.name.clone().unwrap_or_else(|| "classifier".to_string()),
            backend,
            layers,
            input_shape: InputShape {
                height,
                width,
                channels,
            },
            num_classes: manifest.num_classes,
            rescale_divisor: manifest.rescale_divisor,
            layout: manifest.layout,
            interpolation: manifest.interpolation,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_shape(&self) -> InputShape {
        self.input_shape
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn rescale_divisor(&self) -> f32 {
        self.rescale_divisor
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// 对归一化后的 [1, H, W, C] batch 执行前向计算，返回长度为类别数的输出向量
    pub fn forward(&self, batch: Array4<f32>) -> Result<Vec<f32>> {
        let InputShape {
            height,
            width,
            channels,
        } = self.input_shape;

        if batch.dim() != (1, height, width, channels) {
            return Err(ClassifyError::Inference(format!(
                "Expected input batch (1, {}, {}, {}), got {:?}",
                height,
                width,
                channels,
                batch.dim()
            )));
        }

        let mut batch = batch;
        for layer in &self.layers {
            batch = layer.call(batch);
        }

        let batch = match self.layout {
            TensorLayout::Nhwc => batch,
            TensorLayout::Nchw => batch.permuted_axes([0, 3, 1, 2]).as_standard_layout().into_owned(),
        };

        let output = self.backend.run(batch)?;
        let shape = output.shape().to_vec();

        let batch_ok = shape.len() == 1 || (shape.len() >= 2 && shape[0] == 1);
        if !batch_ok || output.len() != self.num_classes {
            return Err(ClassifyError::Inference(format!(
                "Expected output of {} classes for batch size 1, got shape {:?}",
                self.num_classes, shape
            )));
        }

        Ok(output.iter().copied().collect())
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            name: self.name.clone(),
            backend: self.backend.describe(),
            input_shape: self.input_shape,
            num_classes: self.num_classes,
            rescale_divisor: self.rescale_divisor,
            layout: self.layout,
            interpolation: self.interpolation,
            preprocessing_layers: self.layers.iter().map(|l| l.summary()).collect(),
        }
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("backend", &self.backend.describe())
            .field("input_shape", &self.input_shape)
            .field("num_classes", &self.num_classes)
            .field("rescale_divisor", &self.rescale_divisor)
            .field("layers", &self.layers)
            .finish()
    }
}

/// 模型统计信息
#[derive(Debug, Clone, Serialize)]
pub struct ModelStats {
    pub name: String,
    pub backend: String,
    pub input_shape: InputShape,
    pub num_classes: usize,
    pub rescale_divisor: f32,
    pub layout: TensorLayout,
    pub interpolation: Interpolation,
    pub preprocessing_layers: Vec<String>,
}
