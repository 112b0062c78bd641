use crate::utils::error::ClassifyError;
use crate::Result;
use base64::Engine;
use image::{DynamicImage, ImageFormat};

/// 单张上传图片的最大字节数
pub const MAX_IMAGE_BYTES: usize = 16 * 1024 * 1024;

pub struct ImageLoader;

impl ImageLoader {
    /// 解码base64字符串为原始图像字节
    pub fn decode_base64(base64_data: &str) -> Result<Vec<u8>> {
        // 检测并移除可能的数据URL前缀 (data:image/xxx;base64,)
        let base64_clean = match base64_data.strip_prefix("data:") {
            Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
            None => base64_data,
        };

        let image_bytes = base64::engine::general_purpose::STANDARD.decode(base64_clean.trim())?;

        Self::check_size(image_bytes.len())?;
        Ok(image_bytes)
    }

    /// 检查文件大小
    pub fn check_size(len: usize) -> Result<()> {
        if len > MAX_IMAGE_BYTES {
            return Err(ClassifyError::FileTooLarge(len, MAX_IMAGE_BYTES));
        }
        Ok(())
    }

    /// 从内存字节解码图像
    pub fn from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        let format = image::guess_format(bytes)?;

        if !Self::is_supported_format(format) {
            return Err(ClassifyError::UnsupportedFormat(format!("{:?}", format)));
        }

        let image = image::load_from_memory_with_format(bytes, format)?;
        Ok(image)
    }

    /// 检测图像格式
    pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
        image::guess_format(bytes).ok()
    }

    /// 验证图像格式是否支持
    pub fn is_supported_format(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png
                | ImageFormat::Jpeg
                | ImageFormat::Gif
                | ImageFormat::Bmp
                | ImageFormat::Tiff
                | ImageFormat::WebP
        )
    }
}
