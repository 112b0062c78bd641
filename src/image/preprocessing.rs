use crate::models::{InputShape, Interpolation, ModelHandle};
use crate::utils::error::ClassifyError;
use crate::Result;
use image::DynamicImage;
use ndarray::{Array3, Array4, Axis};

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 分类通用预处理：缩放到模型输入尺寸，转为 [1, H, W, C] 并按模型缩放系数归一化
    pub fn prepare(image: &DynamicImage, handle: &ModelHandle) -> Result<Array4<f32>> {
        let shape = handle.input_shape();
        let resized = Self::resize(image, shape, handle.interpolation());
        let array = Self::to_array3(&resized, shape.channels)?;
        Ok(Self::normalize(array, handle.rescale_divisor()))
    }

    /// 拉伸缩放到目标尺寸，不裁剪、不保持宽高比
    pub fn resize(image: &DynamicImage, shape: InputShape, interpolation: Interpolation) -> DynamicImage {
        let (width, height) = (shape.width as u32, shape.height as u32);
        if image.width() == width && image.height() == height {
            return image.clone();
        }
        image.resize_exact(width, height, interpolation.filter_type())
    }

    /// 转换为 HWC 格式的 f32 数组，取值保持在 0-255
    pub fn to_array3(image: &DynamicImage, channels: usize) -> Result<Array3<f32>> {
        let (width, height) = (image.width() as usize, image.height() as usize);

        let raw = match channels {
            1 => image.to_luma8().into_raw(),
            3 => image.to_rgb8().into_raw(),
            4 => image.to_rgba8().into_raw(),
            other => {
                return Err(ClassifyError::InvalidInput(format!(
                    "Unsupported channel count: {}",
                    other
                )))
            }
        };

        let data: Vec<f32> = raw.into_iter().map(f32::from).collect();
        Array3::from_shape_vec((height, width, channels), data)
            .map_err(|e| ClassifyError::Internal(format!("Failed to build image array: {}", e)))
    }

    /// 增加 batch 维度并除以缩放系数
    pub fn normalize(array: Array3<f32>, rescale_divisor: f32) -> Array4<f32> {
        let mut batch = array.insert_axis(Axis(0));
        batch.mapv_inplace(|v| v / rescale_divisor);
        batch
    }
}
