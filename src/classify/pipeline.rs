use crate::{
    classify::{LabelTable, Prediction},
    image::{ImageLoader, ImagePreprocessor, ResultFormatter},
    models::ModelHandle,
    utils::error::ClassifyError,
    Result,
};
use std::sync::Arc;
use std::time::Instant;

/// 分类推理流水线：解码 -> 缩放 -> 归一化 -> 前向计算 -> top-1 -> 标签映射
pub struct InferencePipeline {
    handle: Arc<ModelHandle>,
    labels: Arc<LabelTable>,
}

impl InferencePipeline {
    pub fn new(handle: Arc<ModelHandle>, labels: Arc<LabelTable>) -> Self {
        if handle.num_classes() != labels.len() {
            tracing::warn!(
                "Model has {} classes but label table has {} entries; unmatched indices resolve to \"Unknown\"",
                handle.num_classes(),
                labels.len()
            );
        }

        Self { handle, labels }
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.handle
    }

    /// 阻塞执行一次推理。任何失败都转换为 `Prediction` 错误，原因保留在 source 中。
    pub fn infer(&self, image_bytes: &[u8], filename: &str) -> Result<Prediction> {
        let start_time = Instant::now();

        match self.run(image_bytes, filename) {
            Ok(prediction) => {
                tracing::info!(
                    "Prediction: {} ({:.2}) for '{}' in {:.3}s",
                    prediction.label,
                    prediction.confidence,
                    filename,
                    start_time.elapsed().as_secs_f32()
                );
                Ok(prediction)
            }
            Err(e) => {
                tracing::error!("Prediction failed for '{}': {}", filename, e);
                Err(ClassifyError::prediction(e))
            }
        }
    }

    fn run(&self, image_bytes: &[u8], filename: &str) -> Result<Prediction> {
        let image = ImageLoader::from_bytes(image_bytes)?;
        tracing::debug!("Decoded '{}': {}x{}", filename, image.width(), image.height());

        let batch = ImagePreprocessor::prepare(&image, &self.handle)?;
        let scores = self.handle.forward(batch)?;

        ResultFormatter::format_result(&scores, &self.labels, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InferenceBackend, ModelLoader, ModelManifest};
    use crate::utils::error::ErrorKind;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use ndarray::{Array4, ArrayD};
    use std::error::Error as _;
    use std::io::Cursor;

    /// 输出为输入像素的确定性函数
    struct MeanBackend;

    impl InferenceBackend for MeanBackend {
        fn run(&self, batch: Array4<f32>) -> Result<ArrayD<f32>> {
            let mean = batch.mean().unwrap_or(0.0);
            Ok(ArrayD::from_shape_vec(vec![1, 3], vec![mean / 2.0, 1.0 - mean, mean / 2.0]).unwrap())
        }

        fn describe(&self) -> String {
            "mean".to_string()
        }
    }

    fn pipeline() -> InferencePipeline {
        let manifest = ModelManifest::parse(
            r#"{
                "input_shape": [32, 32, 3],
                "num_classes": 3,
                "rescale_divisor": 255.0,
                "preprocessing": [
                    {"class_name": "RandomFlip", "config": {"mode": "horizontal"}},
                    {"class_name": "RandomZoom", "config": {"height_factor": 0.2}}
                ]
            }"#,
        )
        .unwrap();
        let handle = ModelLoader::new()
            .load_with_backend(&manifest, Box::new(MeanBackend))
            .unwrap();

        InferencePipeline::new(Arc::new(handle), Arc::new(LabelTable::from_labels(["A", "B", "C"])))
    }

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x * 7) as u8, (y * 3) as u8, 90]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[test]
    fn repeated_inference_is_deterministic() {
        let pipeline = pipeline();
        let bytes = jpeg(120, 80);

        let first = pipeline.infer(&bytes, "a.jpg").unwrap();
        for _ in 0..5 {
            let again = pipeline.infer(&bytes, "a.jpg").unwrap();
            assert_eq!(again.label, first.label);
            assert_eq!(again.confidence, first.confidence);
        }
        assert!((0.0..=1.0).contains(&first.confidence));
    }

    #[test]
    fn corrupt_bytes_are_prediction_failure() {
        let pipeline = pipeline();

        let err = pipeline.infer(b"\x89PNG\r\n\x1a\ngarbage", "broken.png").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PredictionFailure);
        assert!(err.source().is_some());

        // 失败不影响后续请求
        assert!(pipeline.infer(&jpeg(16, 16), "ok.jpg").is_ok());
    }
}
