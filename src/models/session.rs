use crate::config::OnnxConfig;
use crate::utils::error::AppError;
use crate::Result;
use ndarray::{Array4, ArrayD};
use ort::{
    inputs,
    session::{builder::GraphOptimizationLevel, Session},
    value::Tensor,
};
use parking_lot::Mutex;
use std::fmt::Display;
use std::path::Path;

/// 单输入单输出的ONNX模型
pub struct OnnxModel {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    kind: &'static str,
}

fn load_error<E: Display>(err: E) -> AppError {
    AppError::ModelLoad(err.to_string())
}

impl OnnxModel {
    pub fn load(path: &Path, config: &OnnxConfig, kind: &'static str) -> Result<Self> {
        if !path.exists() {
            return Err(AppError::ModelLoad(format!(
                "{} model not found: {}",
                kind,
                path.display()
            )));
        }

        tracing::info!("Loading {} model from: {}", kind, path.display());

        let level = match config.optimization_level {
            0 => GraphOptimizationLevel::Disable,
            1 => GraphOptimizationLevel::Level1,
            2 => GraphOptimizationLevel::Level2,
            _ => GraphOptimizationLevel::Level3,
        };

        let session = Session::builder()
            .map_err(load_error)?
            .with_optimization_level(level)
            .map_err(load_error)?
            .with_intra_threads(config.intra_threads)
            .map_err(load_error)?
            .commit_from_file(path)
            .map_err(load_error)?;

        // 动态发现输入输出名称
        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| AppError::ModelLoad(format!("{} model has no inputs", kind)))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| AppError::ModelLoad(format!("{} model has no outputs", kind)))?;

        tracing::debug!("{} model io: '{}' -> '{}'", kind, input_name, output_name);

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            kind,
        })
    }

    /// 执行推理并立即拷贝输出，避免持有会话锁
    pub fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        let input_tensor = Tensor::from_array(input)?;

        let mut session = self.session.lock();
        let outputs = session.run(inputs![self.input_name.as_str() => input_tensor])?;

        match outputs.get(&self.output_name) {
            Some(output) => Ok(output.try_extract_array::<f32>()?.into_owned()),
            None => {
                let available: Vec<String> = outputs.keys().map(|s| s.to_string()).collect();
                Err(AppError::Inference(format!(
                    "{} output '{}' not found. Available outputs: {:?}",
                    self.kind, self.output_name, available
                )))
            }
        }
    }
}
