//! 模型清单
//!
//! ONNX 图本身不携带训练时的 Keras 配置，这里用一个 JSON 清单描述
//! 输入尺寸、类别数、像素缩放系数以及训练图中的预处理层。

use crate::models::registry::LayerSpec;
use crate::utils::error::ClassifyError;
use crate::Result;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 输入张量布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// [N, H, W, C]，Keras 导出模型的默认布局
    #[default]
    Nhwc,
    /// [N, C, H, W]
    Nchw,
}

/// 缩放插值方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    /// 与 Keras `load_img` 默认行为一致
    #[default]
    Nearest,
    Bilinear,
    Bicubic,
    Gaussian,
    Lanczos3,
}

impl Interpolation {
    pub fn filter_type(self) -> FilterType {
        match self {
            Interpolation::Nearest => FilterType::Nearest,
            Interpolation::Bilinear => FilterType::Triangle,
            Interpolation::Bicubic => FilterType::CatmullRom,
            Interpolation::Gaussian => FilterType::Gaussian,
            Interpolation::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    #[serde(default)]
    pub name: Option<String>,

    /// [height, width, channels]
    pub input_shape: [usize; 3],

    pub num_classes: usize,

    /// 像素缩放除数，必须与训练时一致（原始模型为 255.0）
    pub rescale_divisor: f32,

    #[serde(default)]
    pub layout: TensorLayout,

    #[serde(default)]
    pub interpolation: Interpolation,

    /// 训练图中的预处理/数据增强层
    #[serde(default)]
    pub preprocessing: Vec<LayerSpec>,

    /// 输入输出张量名称，缺省时从会话中自动发现
    #[serde(default)]
    pub input_name: Option<String>,

    #[serde(default)]
    pub output_name: Option<String>,
}

impl ModelManifest {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClassifyError::ModelLoad(format!(
                "Failed to read model manifest '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::parse(&content).map_err(|e| {
            ClassifyError::ModelLoad(format!("Invalid model manifest '{}': {}", path.display(), e))
        })
    }

    pub fn parse(content: &str) -> Result<Self> {
        let manifest: ModelManifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        let [height, width, channels] = self.input_shape;

        if height == 0 || width == 0 {
            return Err(ClassifyError::ModelLoad(format!(
                "Input resolution must be non-zero, got {}x{}",
                height, width
            )));
        }

        if !matches!(channels, 1 | 3 | 4) {
            return Err(ClassifyError::ModelLoad(format!(
                "Unsupported channel count {}, expected 1, 3 or 4",
                channels
            )));
        }

        if self.num_classes == 0 {
            return Err(ClassifyError::ModelLoad("num_classes must be positive".to_string()));
        }

        if !self.rescale_divisor.is_finite() || self.rescale_divisor <= 0.0 {
            return Err(ClassifyError::ModelLoad(format!(
                "rescale_divisor must be a positive finite number, got {}",
                self.rescale_divisor
            )));
        }

        Ok(())
    }
}
