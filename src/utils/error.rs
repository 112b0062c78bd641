use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Model not loaded")]
    ServiceUnavailable,

    #[error("No image uploaded: {0}")]
    NoInputProvided(String),

    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Prediction failed: {0}")]
    Prediction(#[source] Box<ClassifyError>),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("File too large: {0} bytes, max allowed: {1} bytes")]
    FileTooLarge(usize, usize),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// 对外可见的错误类别，调用方按类别分支而不是解析错误消息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ModelLoadFailure,
    ServiceUnavailable,
    NoInputProvided,
    DecodeFailure,
    PredictionFailure,
    InvalidInput,
    Internal,
}

impl ClassifyError {
    /// 将流水线内部错误包装为 PredictionFailure，保留原始原因
    pub fn prediction(cause: ClassifyError) -> Self {
        match cause {
            wrapped @ ClassifyError::Prediction(_) => wrapped,
            other => ClassifyError::Prediction(Box::new(other)),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClassifyError::ModelLoad(_) => ErrorKind::ModelLoadFailure,
            ClassifyError::ServiceUnavailable => ErrorKind::ServiceUnavailable,
            ClassifyError::NoInputProvided(_) => ErrorKind::NoInputProvided,
            ClassifyError::ImageDecode(_) => ErrorKind::DecodeFailure,
            ClassifyError::Inference(_) | ClassifyError::Prediction(_) | ClassifyError::Ort(_) => {
                ErrorKind::PredictionFailure
            }
            ClassifyError::InvalidInput(_)
            | ClassifyError::FileTooLarge(_, _)
            | ClassifyError::UnsupportedFormat(_)
            | ClassifyError::Json(_)
            | ClassifyError::Base64(_) => ErrorKind::InvalidInput,
            ClassifyError::Config(_) | ClassifyError::Io(_) | ClassifyError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ClassifyError::NoInputProvided(_) => StatusCode::BAD_REQUEST,
            ClassifyError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ClassifyError::FileTooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
            ClassifyError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ClassifyError::Base64(_) => StatusCode::BAD_REQUEST,
            ClassifyError::Json(_) => StatusCode::BAD_REQUEST,
            ClassifyError::ModelLoad(_) => StatusCode::SERVICE_UNAVAILABLE,
            ClassifyError::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ClassifyError::ModelLoad(_) => "MODEL_LOAD_ERROR",
            ClassifyError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ClassifyError::NoInputProvided(_) => "NO_INPUT_PROVIDED",
            ClassifyError::ImageDecode(_) => "IMAGE_DECODE_ERROR",
            ClassifyError::Inference(_) => "INFERENCE_ERROR",
            ClassifyError::Prediction(_) => "PREDICTION_FAILED",
            ClassifyError::InvalidInput(_) => "INVALID_INPUT",
            ClassifyError::FileTooLarge(_, _) => "FILE_TOO_LARGE",
            ClassifyError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ClassifyError::Config(_) => "CONFIG_ERROR",
            ClassifyError::Io(_) => "IO_ERROR",
            ClassifyError::Json(_) => "JSON_ERROR",
            ClassifyError::Base64(_) => "BASE64_DECODE_ERROR",
            ClassifyError::Ort(_) => "ORT_ERROR",
            ClassifyError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ClassifyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = serde_json::json!({
            "error": {
                "code": self.error_code(),
                "kind": self.kind(),
                "message": self.to_string(),
            }
        });

        match std::error::Error::source(&self) {
            Some(cause) => tracing::error!("Request failed: {} ({}), cause: {}", self, status, cause),
            None => tracing::error!("Request failed: {} ({})", self, status),
        }

        (status, axum::Json(error_response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn prediction_wraps_cause_once() {
        let err = ClassifyError::prediction(ClassifyError::Inference("bad output".to_string()));
        assert_eq!(err.kind(), ErrorKind::PredictionFailure);
        assert!(err.source().unwrap().to_string().contains("bad output"));

        let again = ClassifyError::prediction(err);
        match again {
            ClassifyError::Prediction(inner) => {
                assert!(matches!(*inner, ClassifyError::Inference(_)))
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn status_classes_split_client_and_server() {
        assert_eq!(
            ClassifyError::NoInputProvided("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ClassifyError::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert!(ClassifyError::prediction(ClassifyError::Inference("x".into()))
            .status_code()
            .is_server_error());
    }
}
