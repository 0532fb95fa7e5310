// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理引擎
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::{path::Path, sync::Mutex};

use ort::{
  execution_providers::CUDAExecutionProvider,
  session::{Session, builder::GraphOptimizationLevel},
  value::Tensor,
};
use tracing::{debug, error, info};

use super::{InferenceEngine, ModelError, ModelInfo};
use crate::{frame::NetworkInput, tensor::TensorOutput};

const ONNX_EXTENSION: &str = "onnx";

fn runtime_error(e: impl std::fmt::Display) -> ModelError {
  ModelError::Runtime(e.to_string())
}

/// ONNX Runtime 会话，输出头按模型声明的顺序返回
pub struct OnnxEngine {
  session: Mutex<Session>,
  input_name: String,
  output_names: Vec<String>,
}

impl OnnxEngine {
  pub fn accepts(path: &Path) -> bool {
    path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case(ONNX_EXTENSION))
  }

  /// 加载模型；`use_gpu` 时注册 CUDA 执行提供程序，不可用时由运行时回退到 CPU
  pub fn from_model_info(model_info: &ModelInfo) -> Result<Self, ModelError> {
    let path = model_info.weights();
    info!("加载 ONNX 模型: {}", path.display());

    let mut builder = Session::builder()
      .map_err(runtime_error)?
      .with_optimization_level(GraphOptimizationLevel::Level3)
      .map_err(runtime_error)?;
    if model_info.use_gpu() {
      info!("启用 CUDA 执行提供程序");
      builder = builder
        .with_execution_providers([CUDAExecutionProvider::default().build()])
        .map_err(runtime_error)?;
    }

    let session = builder.commit_from_file(path).map_err(|e| {
      error!("无法加载 ONNX 模型 {}: {}", path.display(), e);
      ModelError::invalid(path, e.to_string())
    })?;

    let input_name = session
      .inputs
      .first()
      .map(|input| input.name.clone())
      .ok_or_else(|| ModelError::invalid(path, "模型没有输入"))?;
    let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
    if output_names.is_empty() {
      return Err(ModelError::invalid(path, "模型没有输出"));
    }
    debug!("模型输入: {}, 输出: {:?}", input_name, output_names);

    Ok(Self {
      session: Mutex::new(session),
      input_name,
      output_names,
    })
  }
}

impl InferenceEngine for OnnxEngine {
  type Error = ModelError;

  fn infer(&self, input: &NetworkInput) -> Result<Vec<TensorOutput>, Self::Error> {
    let data = input.as_nchw().to_vec().into_boxed_slice();
    let tensor = Tensor::from_array((input.shape(), data)).map_err(runtime_error)?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| ModelError::Runtime("会话锁已损坏".to_string()))?;
    let outputs = session
      .run(ort::inputs![self.input_name.as_str() => tensor])
      .map_err(runtime_error)?;

    let mut heads = Vec::with_capacity(self.output_names.len());
    for name in &self.output_names {
      let value = outputs
        .get(name.as_str())
        .ok_or_else(|| ModelError::Runtime(format!("缺少输出头 {name}")))?;
      // RT-DETR 的 labels 头为整型
      let head = match value.try_extract_tensor::<f32>() {
        Ok((shape, data)) => TensorOutput::from_f32(data.to_vec(), dims(shape.iter()))?,
        Err(_) => {
          let (shape, data) = value.try_extract_tensor::<i64>().map_err(runtime_error)?;
          TensorOutput::from_i64(data.to_vec(), dims(shape.iter()))?
        }
      };
      heads.push(head);
    }
    Ok(heads)
  }
}

fn dims<'a>(shape: impl Iterator<Item = &'a i64>) -> Vec<usize> {
  shape.map(|&d| d.max(0) as usize).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_only_onnx_files() {
    assert!(OnnxEngine::accepts(Path::new("yolov8n.onnx")));
    assert!(OnnxEngine::accepts(Path::new("MODEL.ONNX")));
    assert!(!OnnxEngine::accepts(Path::new("model.json")));
    assert!(!OnnxEngine::accepts(Path::new("yolov4.weights")));
  }

  #[test]
  fn corrupt_model_is_invalid_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.onnx");
    std::fs::write(&path, b"not a model").unwrap();
    let info = ModelInfo::builder(&path).build().unwrap();

    assert!(matches!(
      OnnxEngine::from_model_info(&info),
      Err(ModelError::InvalidModelArtifact { .. })
    ));
  }
}
