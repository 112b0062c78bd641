use crate::classify::{LabelTable, Prediction};
use crate::utils::error::ClassifyError;
use crate::Result;

/// 结果格式化器
pub struct ResultFormatter;

impl ResultFormatter {
    /// 取最大输出的类别及其值。并列时取第一个。
    pub fn top1(scores: &[f32]) -> Result<(usize, f32)> {
        if let Some(bad) = scores.iter().find(|v| !v.is_finite()) {
            return Err(ClassifyError::Inference(format!(
                "Model produced a non-finite output value: {}",
                bad
            )));
        }

        let (index, confidence) = scores
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (i, v)| match best {
                Some((_, max)) if v <= max => best,
                _ => Some((i, v)),
            })
            .ok_or_else(|| ClassifyError::Inference("Model produced an empty output".to_string()))?;

        if !(0.0..=1.0).contains(&confidence) {
            return Err(ClassifyError::Inference(format!(
                "Model output is not a probability vector: max value {}",
                confidence
            )));
        }

        Ok((index, confidence))
    }

    /// 归约输出并映射标签
    pub fn format_result(scores: &[f32], labels: &LabelTable, filename: &str) -> Result<Prediction> {
        let (class_index, confidence) = Self::top1(scores)?;

        Ok(Prediction {
            label: labels.resolve(class_index).to_string(),
            class_index,
            confidence,
            filename: filename.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc() -> LabelTable {
        LabelTable::from_labels(["A", "B", "C"])
    }

    #[test]
    fn picks_maximum() {
        let prediction = ResultFormatter::format_result(&[0.1, 0.7, 0.2], &abc(), "x.png").unwrap();
        assert_eq!(prediction.label, "B");
        assert_eq!(prediction.class_index, 1);
        assert_eq!(prediction.confidence, 0.7);
        assert_eq!(prediction.filename, "x.png");
    }

    #[test]
    fn confidence_equals_max_output() {
        let scores = [0.05, 0.15, 0.02, 0.6, 0.18];
        let (_, confidence) = ResultFormatter::top1(&scores).unwrap();
        let max = scores.iter().copied().fold(f32::MIN, f32::max);
        assert_eq!(confidence, max);
    }

    #[test]
    fn ties_keep_first_index() {
        assert_eq!(ResultFormatter::top1(&[0.4, 0.4, 0.2]).unwrap(), (0, 0.4));
    }

    #[test]
    fn index_outside_label_table_is_unknown() {
        let prediction = ResultFormatter::format_result(&[0.1, 0.1, 0.1, 0.7], &abc(), "x.png").unwrap();
        assert_eq!(prediction.label, "Unknown");
        assert_eq!(prediction.class_index, 3);
    }

    #[test]
    fn rejects_invalid_outputs() {
        assert!(ResultFormatter::top1(&[]).is_err());
        assert!(ResultFormatter::top1(&[0.2, f32::NAN]).is_err());
        assert!(ResultFormatter::top1(&[3.5, -1.0]).is_err());
    }
}
