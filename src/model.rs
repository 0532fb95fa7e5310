// 该文件是 Kanjian （看见） 项目的一部分。
// src/model.rs - 模型描述与推理引擎接口
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

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{args::AppConfig, frame::NetworkInput, tensor::TensorOutput};

#[cfg(feature = "onnx")]
mod onnx;
mod recorded;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxEngine;
pub use self::recorded::RecordedEngine;

pub const DEFAULT_NETWORK_WIDTH: u32 = 640;
pub const DEFAULT_NETWORK_HEIGHT: u32 = 640;

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("模型文件无效: {path}: {reason}")]
  InvalidModelArtifact { path: PathBuf, reason: String },
  #[error("不支持的模型文件格式: {0}")]
  UnsupportedArtifact(PathBuf),
  #[error("网络输入尺寸必须大于 0, 实际为 {width}x{height}")]
  InvalidNetworkSize { width: u32, height: u32 },
  #[error("JSON 解析错误: {0}")]
  Json(#[from] serde_json::Error),
  #[error("张量错误: {0}")]
  Tensor(#[from] crate::tensor::TensorError),
  #[cfg(feature = "onnx")]
  #[error("ONNX Runtime 错误: {0}")]
  Runtime(String),
}

impl ModelError {
  pub fn invalid(path: &Path, reason: impl Into<String>) -> Self {
    ModelError::InvalidModelArtifact {
      path: path.to_path_buf(),
      reason: reason.into(),
    }
  }
}

/// 推理引擎：执行一次前向传播，返回每个输出头的张量
pub trait InferenceEngine {
  type Error;

  fn infer(&self, input: &NetworkInput) -> Result<Vec<TensorOutput>, Self::Error>;
}

/// 模型描述：文件路径、网络输入尺寸和类别标签，构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
  weights: PathBuf,
  config: Option<PathBuf>,
  network_width: u32,
  network_height: u32,
  labels: Vec<String>,
  use_gpu: bool,
}

impl ModelInfo {
  pub fn builder(weights: impl Into<PathBuf>) -> ModelInfoBuilder {
    ModelInfoBuilder {
      weights: weights.into(),
      config: None,
      network_width: DEFAULT_NETWORK_WIDTH,
      network_height: DEFAULT_NETWORK_HEIGHT,
      labels: Vec::new(),
      use_gpu: false,
    }
  }

  /// 从命令行配置构造，检查模型文件是否存在并读取标签文件
  pub fn from_config(config: &AppConfig) -> Result<Self, ModelError> {
    check_artifact(&config.weights)?;
    if let Some(path) = &config.config {
      check_artifact(path)?;
    }

    let labels = match &config.labels {
      Some(path) => load_labels(path)?,
      None => Vec::new(),
    };

    let mut builder = ModelInfo::builder(&config.weights)
      .network_size(config.input_width, config.input_height)
      .labels(labels)
      .use_gpu(config.use_gpu);
    if let Some(path) = &config.config {
      builder = builder.config(path);
    }
    builder.build()
  }

  pub fn weights(&self) -> &Path {
    &self.weights
  }

  pub fn config(&self) -> Option<&Path> {
    self.config.as_deref()
  }

  pub fn network_width(&self) -> u32 {
    self.network_width
  }

  pub fn network_height(&self) -> u32 {
    self.network_height
  }

  pub fn labels(&self) -> &[String] {
    &self.labels
  }

  pub fn label(&self, class_id: usize) -> Option<&str> {
    self.labels.get(class_id).map(String::as_str)
  }

  pub fn use_gpu(&self) -> bool {
    self.use_gpu
  }
}

pub struct ModelInfoBuilder {
  weights: PathBuf,
  config: Option<PathBuf>,
  network_width: u32,
  network_height: u32,
  labels: Vec<String>,
  use_gpu: bool,
}

impl ModelInfoBuilder {
  pub fn config(mut self, config: impl Into<PathBuf>) -> Self {
    self.config = Some(config.into());
    self
  }

  pub fn network_size(mut self, width: u32, height: u32) -> Self {
    self.network_width = width;
    self.network_height = height;
    self
  }

  pub fn labels(mut self, labels: Vec<String>) -> Self {
    self.labels = labels;
    self
  }

  pub fn use_gpu(mut self, use_gpu: bool) -> Self {
    self.use_gpu = use_gpu;
    self
  }

  /// 网络输入宽高必须大于 0
  pub fn build(self) -> Result<ModelInfo, ModelError> {
    if self.network_width == 0 || self.network_height == 0 {
      error!(
        "网络输入尺寸无效: {}x{}",
        self.network_width, self.network_height
      );
      return Err(ModelError::InvalidNetworkSize {
        width: self.network_width,
        height: self.network_height,
      });
    }

    Ok(ModelInfo {
      weights: self.weights,
      config: self.config,
      network_width: self.network_width,
      network_height: self.network_height,
      labels: self.labels,
      use_gpu: self.use_gpu,
    })
  }
}

/// 按权重文件扩展名选择的推理引擎
pub enum Engine {
  Recorded(RecordedEngine),
  #[cfg(feature = "onnx")]
  Onnx(OnnxEngine),
}

impl Engine {
  /// `.json` 使用回放引擎，`.onnx` 使用 ONNX Runtime（需要 `onnx` 功能）
  pub fn open(model_info: &ModelInfo) -> Result<Self, ModelError> {
    let weights = model_info.weights();
    if RecordedEngine::accepts(weights) {
      if model_info.use_gpu() {
        warn!("回放引擎不使用 GPU，忽略 --use-gpu");
      }
      return Ok(Engine::Recorded(RecordedEngine::from_path(weights)?));
    }

    #[cfg(feature = "onnx")]
    if OnnxEngine::accepts(weights) {
      return Ok(Engine::Onnx(OnnxEngine::from_model_info(model_info)?));
    }

    error!("不支持的模型文件格式: {}", weights.display());
    Err(ModelError::UnsupportedArtifact(weights.to_path_buf()))
  }
}

impl InferenceEngine for Engine {
  type Error = ModelError;

  fn infer(&self, input: &NetworkInput) -> Result<Vec<TensorOutput>, Self::Error> {
    match self {
      Engine::Recorded(engine) => engine.infer(input),
      #[cfg(feature = "onnx")]
      Engine::Onnx(engine) => engine.infer(input),
    }
  }
}

fn check_artifact(path: &Path) -> Result<(), ModelError> {
  match std::fs::metadata(path) {
    Ok(meta) if meta.is_file() => Ok(()),
    Ok(_) => {
      error!("模型文件不是普通文件: {}", path.display());
      Err(ModelError::invalid(path, "不是普通文件"))
    }
    Err(e) => {
      error!("无法访问模型文件 {}: {}", path.display(), e);
      Err(ModelError::invalid(path, e.to_string()))
    }
  }
}

/// 读取标签文件，每行一个类别名称，忽略空行
pub fn load_labels(path: &Path) -> Result<Vec<String>, ModelError> {
  info!("加载标签文件: {}", path.display());
  let content = std::fs::read_to_string(path).map_err(|e| {
    error!("无法读取标签文件 {}: {}", path.display(), e);
    ModelError::invalid(path, e.to_string())
  })?;

  let labels: Vec<String> = content
    .lines()
    .map(str::trim)
    .filter(|line| !line.is_empty())
    .map(String::from)
    .collect();
  debug!("标签数量: {}", labels.len());
  Ok(labels)
}
