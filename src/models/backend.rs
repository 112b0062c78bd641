use crate::config::OnnxConfig;
use crate::utils::error::ClassifyError;
use crate::Result;
use ndarray::{Array4, ArrayD};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::path::Path;

/// 前向计算后端
///
/// 实现不得修改共享权重；模型句柄在多个请求之间只读共享。
pub trait InferenceBackend: Send + Sync {
    /// 对单个 batch 执行前向计算，返回原始输出张量
    fn run(&self, batch: Array4<f32>) -> Result<ArrayD<f32>>;

    fn describe(&self) -> String;
}

pub struct OnnxBackend {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl OnnxBackend {
    pub fn from_file(
        model_path: &Path,
        onnx_config: &OnnxConfig,
        input_name: Option<&str>,
        output_name: Option<&str>,
    ) -> Result<Self> {
        if !model_path.exists() {
            return Err(ClassifyError::ModelLoad(format!(
                "Classification model not found: {}",
                model_path.display()
            )));
        }

        tracing::info!("Loading classification model from: {}", model_path.display());

        let session = Session::builder()?
            .with_optimization_level(optimization_level(onnx_config.optimization_level))?
            .with_intra_threads(onnx_config.intra_threads)?
            .commit_from_file(model_path)?;

        for (i, input) in session.inputs.iter().enumerate() {
            tracing::debug!("Classification input[{}]: '{}'", i, input.name);
        }
        for (i, output) in session.outputs.iter().enumerate() {
            tracing::debug!("Classification output[{}]: '{}'", i, output.name);
        }

        let input_name = pick_name(
            "input",
            input_name,
            session.inputs.iter().map(|i| i.name.as_str()),
        )?;
        let output_name = pick_name(
            "output",
            output_name,
            session.outputs.iter().map(|o| o.name.as_str()),
        )?;

        tracing::info!(
            "Classification model tensors: input='{}', output='{}'",
            input_name,
            output_name
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl InferenceBackend for OnnxBackend {
    fn run(&self, batch: Array4<f32>) -> Result<ArrayD<f32>> {
        let input_tensor = Tensor::from_array(batch)?;

        // 会话在锁内执行，底层运行时按句柄串行化
        let mut session = self.session.lock();
        let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

        match outputs.get(self.output_name.as_str()) {
            Some(output) => Ok(output.try_extract_array::<f32>()?.into_owned()),
            None => {
                let available_outputs: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                Err(ClassifyError::Inference(format!(
                    "Classification output '{}' not found. Available outputs: {:?}",
                    self.output_name, available_outputs
                )))
            }
        }
    }

    fn describe(&self) -> String {
        format!("onnxruntime({} -> {})", self.input_name, self.output_name)
    }
}

fn optimization_level(level: u8) -> GraphOptimizationLevel {
    match level {
        0 => GraphOptimizationLevel::Disable,
        1 => GraphOptimizationLevel::Level1,
        2 => GraphOptimizationLevel::Level2,
        _ => GraphOptimizationLevel::Level3,
    }
}

/// 使用清单中指定的张量名，否则取会话中的第一个
fn pick_name<'a>(
    what: &str,
    requested: Option<&str>,
    mut available: impl Iterator<Item = &'a str> + Clone,
) -> Result<String> {
    match requested {
        Some(name) if available.clone().any(|n| n == name) => Ok(name.to_string()),
        Some(name) => Err(ClassifyError::ModelLoad(format!(
            "Model has no {} named '{}'. Available: {:?}",
            what,
            name,
            available.collect::<Vec<_>>()
        ))),
        None => available
            .next()
            .map(str::to_string)
            .ok_or_else(|| ClassifyError::ModelLoad(format!("Classification model has no {}s", what))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_name_by_default() {
        let names = ["input_1", "aux"];
        assert_eq!(pick_name("input", None, names.iter().copied()).unwrap(), "input_1");
    }

    #[test]
    fn requested_name_must_exist() {
        let names = ["dense_2"];
        assert_eq!(
            pick_name("output", Some("dense_2"), names.iter().copied()).unwrap(),
            "dense_2"
        );
        assert!(matches!(
            pick_name("output", Some("logits"), names.iter().copied()),
            Err(ClassifyError::ModelLoad(_))
        ));
    }

    #[test]
    fn empty_graph_has_no_tensors() {
        let names: [&str; 0] = [];
        assert!(pick_name("input", None, names.iter().copied()).is_err());
    }

    #[test]
    fn missing_model_file() {
        let config = OnnxConfig {
            intra_threads: 1,
            optimization_level: 3,
        };
        let err = OnnxBackend::from_file(Path::new("/nonexistent/model.onnx"), &config, None, None)
            .err()
            .unwrap();
        assert!(matches!(err, ClassifyError::ModelLoad(_)));
    }
}
