use serde::{Deserialize, Serialize};

/// 单张图片的分类结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 类别名称，索引不在标签表中时为 "Unknown"
    #[serde(rename = "class")]
    pub label: String,

    /// 预测类别的模型原始输出值 (0.0 - 1.0)
    pub confidence: f32,

    /// 上传时的原始文件名
    pub filename: String,

    #[serde(skip)]
    pub class_index: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_boundary_shape() {
        let prediction = Prediction {
            label: "MONARCH".to_string(),
            confidence: 0.5,
            filename: "monarch.jpg".to_string(),
            class_index: 44,
        };

        let value = serde_json::to_value(&prediction).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"class": "MONARCH", "confidence": 0.5, "filename": "monarch.jpg"})
        );
    }
}
