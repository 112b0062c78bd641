use crate::utils::error::ClassifyError;
use crate::Result;
use std::path::{Path, PathBuf};

/// 上传图片暂存目录。清理策略不在这里处理，同名文件直接覆盖。
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 只保留文件名部分，防止路径穿越
    pub fn sanitize(filename: &str) -> Result<String> {
        let name = filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .trim();

        if name.is_empty() || name == "." || name == ".." {
            return Err(ClassifyError::NoInputProvided(format!(
                "Invalid file name '{}'",
                filename
            )));
        }

        Ok(name.to_string())
    }

    pub async fn stage(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        let name = Self::sanitize(filename)?;
        let path = self.dir.join(name);

        tracing::info!("Saving uploaded image to {}", path.display());
        tokio::fs::write(&path, bytes).await?;

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(UploadStore::sanitize("monarch.jpg").unwrap(), "monarch.jpg");
        assert_eq!(UploadStore::sanitize("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(UploadStore::sanitize("C:\\Users\\me\\wing.png").unwrap(), "wing.png");
    }

    #[test]
    fn sanitize_rejects_empty_names() {
        for name in ["", "   ", "..", "dir/", "/"] {
            assert!(
                matches!(UploadStore::sanitize(name), Err(ClassifyError::NoInputProvided(_))),
                "{:?}",
                name
            );
        }
    }

    #[tokio::test]
    async fn stage_writes_inside_upload_dir() {
        let root = TempDir::new().unwrap();
        let store = UploadStore::new(root.path().join("static/images")).await.unwrap();

        let path = store.stage("../escape.png", b"bytes").await.unwrap();

        assert_eq!(path, root.path().join("static/images/escape.png"));
        assert_eq!(std::fs::read(&path).unwrap(), b"bytes");
    }
}
