// 该文件是 Kanjian （看见） 项目的一部分。
// src/model/recorded.rs - 回放录制的推理输出
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

use std::{cell::Cell, path::Path};

use serde::Deserialize;
use tracing::{debug, error, info};

use super::{InferenceEngine, ModelError};
use crate::{frame::NetworkInput, tensor::TensorOutput};

const RECORDED_EXTENSION: &str = "json";
const INLINE_SOURCE: &str = "<inline>";

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum DType {
  #[default]
  F32,
  I64,
}

#[derive(Deserialize, Debug)]
struct RecordedTensor {
  shape: Vec<usize>,
  #[serde(default)]
  dtype: DType,
  data: Vec<f64>,
}

#[derive(Deserialize, Debug)]
struct RecordedFrame {
  outputs: Vec<RecordedTensor>,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Recording {
  Single(RecordedFrame),
  Sequence { frames: Vec<RecordedFrame> },
}

/// 回放引擎：从 JSON 文件读取预先录制的输出张量，按帧循环返回
///
/// 文件格式为 `{"outputs": [...]}`（每帧都返回同一组输出）或
/// `{"frames": [{"outputs": [...]}, ...]}`。每个张量为
/// `{"shape": [..], "dtype": "f32" | "i64", "data": [..]}`。
pub struct RecordedEngine {
  frames: Vec<Vec<TensorOutput>>,
  cursor: Cell<usize>,
}

impl RecordedEngine {
  /// 是否为回放引擎可以读取的文件
  pub fn accepts(path: &Path) -> bool {
    path
      .extension()
      .and_then(|ext| ext.to_str())
      .is_some_and(|ext| ext.eq_ignore_ascii_case(RECORDED_EXTENSION))
  }

  pub fn from_path(path: &Path) -> Result<Self, ModelError> {
    if !Self::accepts(path) {
      error!("回放引擎只接受 .json 文件: {}", path.display());
      return Err(ModelError::UnsupportedArtifact(path.to_path_buf()));
    }

    info!("加载录制的推理输出: {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| {
      error!("无法读取录制文件 {}: {}", path.display(), e);
      ModelError::invalid(path, e.to_string())
    })?;
    let engine = Self::parse(&content, path)?;
    debug!("录制帧数: {}", engine.frames.len());
    Ok(engine)
  }

  pub fn from_json(content: &str) -> Result<Self, ModelError> {
    Self::parse(content, Path::new(INLINE_SOURCE))
  }

  /// 至少一帧，且每帧至少一个输出头
  fn parse(content: &str, source: &Path) -> Result<Self, ModelError> {
    let recording: Recording = serde_json::from_str(content)?;
    let frames = match recording {
      Recording::Single(frame) => vec![frame],
      Recording::Sequence { frames } => frames,
    };

    if frames.is_empty() {
      error!("录制文件中没有任何帧: {}", source.display());
      return Err(ModelError::invalid(source, "录制中没有任何帧"));
    }
    if let Some(index) = frames.iter().position(|frame| frame.outputs.is_empty()) {
      error!("录制文件第 {} 帧没有输出头: {}", index, source.display());
      return Err(ModelError::invalid(
        source,
        format!("第 {index} 帧没有输出头"),
      ));
    }

    let frames = frames
      .into_iter()
      .map(|frame| {
        frame
          .outputs
          .into_iter()
          .map(into_tensor)
          .collect::<Result<Vec<_>, _>>()
      })
      .collect::<Result<Vec<_>, _>>()?;

    Ok(Self {
      frames,
      cursor: Cell::new(0),
    })
  }

  pub fn num_frames(&self) -> usize {
    self.frames.len()
  }
}

fn into_tensor(tensor: RecordedTensor) -> Result<TensorOutput, ModelError> {
  let output = match tensor.dtype {
    DType::F32 => TensorOutput::from_f32(
      tensor.data.into_iter().map(|v| v as f32).collect(),
      tensor.shape,
    )?,
    DType::I64 => TensorOutput::from_i64(
      tensor.data.into_iter().map(|v| v as i64).collect(),
      tensor.shape,
    )?,
  };
  Ok(output)
}

impl InferenceEngine for RecordedEngine {
  type Error = ModelError;

  fn infer(&self, input: &NetworkInput) -> Result<Vec<TensorOutput>, Self::Error> {
    debug!("回放推理，输入形状: {:?}", input.shape());
    let index = self.cursor.get();
    self.cursor.set((index + 1) % self.frames.len());
    Ok(self.frames[index].clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbImage;

  fn dummy_input() -> NetworkInput {
    NetworkInput::from(&RgbImage::new(2, 2))
  }

  #[test]
  fn replays_single_frame_for_every_call() {
    let engine =
      RecordedEngine::from_json(r#"{"outputs": [{"shape": [1, 1, 5], "data": [0.5, 0.5, 0.2, 0.2, 0.9]}]}"#)
        .unwrap();
    let first = engine.infer(&dummy_input()).unwrap();
    let second = engine.infer(&dummy_input()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first[0].shape(), &[1, 1, 5]);
  }

  #[test]
  fn cycles_through_frames() {
    let engine = RecordedEngine::from_json(
      r#"{"frames": [
        {"outputs": [{"shape": [1], "dtype": "i64", "data": [1]}]},
        {"outputs": [{"shape": [1], "dtype": "i64", "data": [2]}]}
      ]}"#,
    )
    .unwrap();
    assert_eq!(engine.num_frames(), 2);
    let values: Vec<f32> = (0..3)
      .map(|_| engine.infer(&dummy_input()).unwrap()[0].value(0))
      .collect();
    assert_eq!(values, vec![1.0, 2.0, 1.0]);
  }

  #[test]
  fn rejects_bad_element_count() {
    let err = RecordedEngine::from_json(r#"{"outputs": [{"shape": [2, 2], "data": [1.0]}]}"#)
      .err()
      .unwrap();
    assert!(matches!(err, ModelError::Tensor(_)));
  }

  #[test]
  fn rejects_recording_without_frames() {
    let err = RecordedEngine::from_json(r#"{"frames": []}"#).err().unwrap();
    assert!(matches!(err, ModelError::InvalidModelArtifact { .. }));
  }

  #[test]
  fn rejects_frame_without_outputs() {
    for content in [
      r#"{"outputs": []}"#,
      r#"{"frames": [{"outputs": [{"shape": [1], "data": [1]}]}, {"outputs": []}]}"#,
    ] {
      let err = RecordedEngine::from_json(content).err().unwrap();
      assert!(matches!(err, ModelError::InvalidModelArtifact { .. }));
    }
  }

  #[test]
  fn empty_recording_on_disk_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.json");
    std::fs::write(&path, r#"{"frames": []}"#).unwrap();

    match RecordedEngine::from_path(&path) {
      Err(ModelError::InvalidModelArtifact { path: reported, .. }) => assert_eq!(reported, path),
      other => panic!("unexpected result: {:?}", other.map(|e| e.num_frames())),
    }
  }

  #[test]
  fn rejects_non_json_artifacts() {
    let err = RecordedEngine::from_path(Path::new("model.onnx")).err().unwrap();
    assert!(matches!(err, ModelError::UnsupportedArtifact(_)));
  }
}
