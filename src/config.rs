use crate::utils::error::ClassifyError;
use crate::Result;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    /// 服务器绑定地址
    pub bind_addr: String,

    /// ONNX 模型文件路径
    pub model_path: PathBuf,

    /// 模型清单路径（缺省为同名 .json）
    pub manifest_path: PathBuf,

    /// 标签文件路径，未提供时使用内置蝴蝶标签表
    pub labels_path: Option<PathBuf>,

    /// 上传图片暂存目录
    pub upload_dir: PathBuf,

    /// 工作线程数量
    pub workers: usize,

    /// 开发模式
    pub dev_mode: bool,

    /// ONNX Runtime配置
    pub onnx_config: OnnxConfig,

    /// 服务器配置
    pub server_config: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct OnnxConfig {
    /// CPU线程数
    pub intra_threads: usize,

    /// 优化级别 (0-3)
    pub optimization_level: u8,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// 请求超时时间（秒）
    pub request_timeout: u64,

    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

impl Config {
    pub fn new(
        bind_addr: String,
        model_path: impl Into<PathBuf>,
        manifest_path: Option<PathBuf>,
        labels_path: Option<PathBuf>,
        upload_dir: impl Into<PathBuf>,
        workers: Option<usize>,
        dev_mode: bool,
    ) -> Result<Self> {
        let model_path = model_path.into();
        if model_path.as_os_str().is_empty() {
            return Err(ClassifyError::Config("Model path must not be empty".to_string()));
        }

        let cpu_cores = num_cpus::get();
        let workers = workers.unwrap_or(cpu_cores).max(1);

        let onnx_config = OnnxConfig {
            intra_threads: (cpu_cores * 3 / 4).max(1), // 使用75%的CPU核心
            optimization_level: 3,
        };

        let server_config = ServerConfig {
            request_timeout: if dev_mode { 300 } else { 60 }, // 开发模式更长超时
            max_request_size: 16 * 1024 * 1024, // 16MB
        };

        let manifest_path = manifest_path.unwrap_or_else(|| default_manifest_path(&model_path));

        Ok(Self {
            bind_addr,
            model_path,
            manifest_path,
            labels_path,
            upload_dir: upload_dir.into(),
            workers,
            dev_mode,
            onnx_config,
            server_config,
        })
    }
}

/// `models/butterfly.onnx` -> `models/butterfly.json`
pub fn default_manifest_path(model_path: &Path) -> PathBuf {
    model_path.with_extension("json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_defaults_next_to_model() {
        let config = Config::new(
            "127.0.0.1:5000".to_string(),
            "my_model/butterfly_model.onnx",
            None,
            None,
            "static/images",
            Some(2),
            false,
        )
        .unwrap();

        assert_eq!(config.manifest_path, PathBuf::from("my_model/butterfly_model.json"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.server_config.request_timeout, 60);
    }

    #[test]
    fn explicit_manifest_wins() {
        let config = Config::new(
            "127.0.0.1:5000".to_string(),
            "model.onnx",
            Some(PathBuf::from("meta/config.json")),
            None,
            "uploads",
            None,
            true,
        )
        .unwrap();

        assert_eq!(config.manifest_path, PathBuf::from("meta/config.json"));
        assert_eq!(config.server_config.request_timeout, 300);
        assert!(config.workers >= 1);
    }

    #[test]
    fn empty_model_path_is_rejected() {
        let err = Config::new("0.0.0.0:5000".into(), "", None, None, "u", None, false).unwrap_err();
        assert!(matches!(err, ClassifyError::Config(_)));
    }
}
