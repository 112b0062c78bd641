use crate::{
    classify::Prediction,
    image::ImageLoader,
    utils::error::ClassifyError,
    web::{
        extractors::{RequestId, Validate, ValidatedJson},
        SharedState,
    },
    Result,
};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    response::Json,
};
use serde::Deserialize;
use std::time::Instant;

/// JSON请求体（base64模式）
#[derive(Debug, Deserialize)]
pub struct PredictJsonRequest {
    /// Base64编码的图像数据，可带 data URL 前缀
    pub image: String,

    /// 原始文件名
    #[serde(default)]
    pub filename: Option<String>,
}

impl Validate for PredictJsonRequest {
    fn validate(&self) -> Result<()> {
        if self.image.trim().is_empty() {
            return Err(ClassifyError::NoInputProvided("Image data cannot be empty".to_string()));
        }

        if let Some(ref filename) = self.filename {
            if filename.trim().is_empty() {
                return Err(ClassifyError::NoInputProvided("File name cannot be empty".to_string()));
            }
        }

        Ok(())
    }
}

/// 上传的单个文件
struct UploadedFile {
    filename: String,
    data: Bytes,
}

/// Multipart文件上传处理器，图像字段为 `image`，兼容 `file`
pub async fn predict_upload_handler(
    State(state): State<SharedState>,
    RequestId(request_id): RequestId,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>> {
    tracing::info!("Received a prediction request: request_id={}", request_id);

    // 模型未加载时不读取上传内容
    state.service.ensure_ready()?;

    let mut multipart = multipart.map_err(|e| {
        ClassifyError::NoInputProvided(format!("No image uploaded: {}", e.body_text()))
    })?;

    let mut image_field: Option<UploadedFile> = None;
    let mut file_field: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ClassifyError::InvalidInput(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "image" | "file" => {
                let content_type = field.content_type().unwrap_or("unknown").to_string();
                let filename = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| {
                    ClassifyError::InvalidInput(format!("Failed to read file data: {}", e))
                })?;

                tracing::debug!(
                    "Received field '{}': '{}' ({}, {} bytes)",
                    field_name,
                    filename,
                    content_type,
                    data.len()
                );

                let upload = Some(UploadedFile { filename, data });
                if field_name == "image" {
                    image_field = upload;
                } else {
                    file_field = upload;
                }
            }
            _ => {
                tracing::debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    let upload = select_upload(image_field, file_field)
        .ok_or_else(|| ClassifyError::NoInputProvided("No image uploaded".to_string()))?;

    if upload.filename.trim().is_empty() || upload.data.is_empty() {
        return Err(ClassifyError::NoInputProvided(
            "No image uploaded or invalid file name".to_string(),
        ));
    }

    run_prediction(state, upload, &request_id).await
}

/// JSON base64上传处理器
pub async fn predict_json_handler(
    State(state): State<SharedState>,
    RequestId(request_id): RequestId,
    payload: std::result::Result<ValidatedJson<PredictJsonRequest>, ClassifyError>,
) -> Result<Json<Prediction>> {
    tracing::info!("Received a JSON prediction request: request_id={}", request_id);

    state.service.ensure_ready()?;
    let ValidatedJson(request) = payload?;

    let data = ImageLoader::decode_base64(&request.image)?;
    if data.is_empty() {
        return Err(ClassifyError::NoInputProvided("Decoded image is empty".to_string()));
    }

    let filename = request.filename.unwrap_or_else(|| default_filename(&data));
    let upload = UploadedFile {
        filename,
        data: Bytes::from(data),
    };

    run_prediction(state, upload, &request_id).await
}

/// 暂存上传文件后在阻塞线程中执行推理
async fn run_prediction(
    state: SharedState,
    upload: UploadedFile,
    request_id: &str,
) -> Result<Json<Prediction>> {
    let start_time = Instant::now();

    state.uploads.stage(&upload.filename, &upload.data).await?;

    let service = state.service.clone();
    let UploadedFile { filename, data } = upload;
    let prediction = tokio::task::spawn_blocking(move || service.predict(&data, &filename))
        .await
        .map_err(|e| ClassifyError::Internal(format!("Inference task failed: {}", e)))??;

    tracing::info!(
        "Prediction completed: request_id={}, class={}, confidence={:.4}, time={:.3}s",
        request_id,
        prediction.label,
        prediction.confidence,
        start_time.elapsed().as_secs_f32()
    );

    Ok(Json(prediction))
}

/// `image` 字段有文件名时优先，否则回退到 `file`
fn select_upload(image: Option<UploadedFile>, file: Option<UploadedFile>) -> Option<UploadedFile> {
    match (image, file) {
        (Some(image), _) if !image.filename.trim().is_empty() => Some(image),
        (_, Some(file)) => Some(file),
        (image, None) => image,
    }
}

fn default_filename(data: &[u8]) -> String {
    let extension = ImageLoader::detect_format(data)
        .and_then(|format| format.extensions_str().first().copied())
        .unwrap_or("bin");
    format!("upload.{}", extension)
}
