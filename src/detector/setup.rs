// 该文件是 Kanjian （看见） 项目的一部分。
// src/detector/setup.rs - 按名称创建检测器
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

use std::{fmt, str::FromStr};

use thiserror::Error;
use tracing::{error, info};

use super::{Detector, RtDetr, RtDetrUltralytics, YoloNas, YoloV4, YoloV10, YoloVn, YoloVnLayout};
use crate::{detection::Thresholds, model::ModelInfo};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DetectorError {
  #[error("不支持的检测器类型: {0}（可选: {names}）", names = DetectorKind::names().join(", "))]
  UnsupportedDetectorType(String),
}

/// 已注册的检测器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorKind {
  YoloV4,
  YoloV5,
  YoloV6,
  YoloV7,
  YoloV8,
  YoloV9,
  YoloV10,
  Yolo11,
  YoloNas,
  RtDetr,
  RtDetrUltralytics,
}

/// 名称到类型的映射，名称区分大小写
const REGISTRY: &[(&str, DetectorKind)] = &[
  ("yolov4", DetectorKind::YoloV4),
  ("yolov5", DetectorKind::YoloV5),
  ("yolov6", DetectorKind::YoloV6),
  ("yolov7", DetectorKind::YoloV7),
  ("yolov8", DetectorKind::YoloV8),
  ("yolov9", DetectorKind::YoloV9),
  ("yolov10", DetectorKind::YoloV10),
  ("yolo11", DetectorKind::Yolo11),
  ("yolonas", DetectorKind::YoloNas),
  ("rtdetr", DetectorKind::RtDetr),
  ("rtdetr_ultralytics", DetectorKind::RtDetrUltralytics),
];

impl DetectorKind {
  /// 全部已注册的名称
  pub fn names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
  }

  pub fn as_str(&self) -> &'static str {
    REGISTRY
      .iter()
      .find(|(_, kind)| kind == self)
      .map(|(name, _)| *name)
      .unwrap_or("unknown")
  }

  /// 用模型描述和阈值构造对应的检测器
  pub fn build(&self, model_info: &ModelInfo, thresholds: Thresholds) -> Box<dyn Detector> {
    match self {
      DetectorKind::YoloV4 => Box::new(YoloV4::new(model_info, thresholds)),
      DetectorKind::YoloV5 | DetectorKind::YoloV7 => Box::new(YoloVn::new(
        model_info,
        thresholds,
        YoloVnLayout::ANCHOR_BASED,
      )),
      DetectorKind::YoloV6 | DetectorKind::YoloV8 | DetectorKind::YoloV9 | DetectorKind::Yolo11 => {
        Box::new(YoloVn::new(
          model_info,
          thresholds,
          YoloVnLayout::ANCHOR_FREE,
        ))
      }
      DetectorKind::YoloV10 => Box::new(YoloV10::new(model_info, thresholds)),
      DetectorKind::YoloNas => Box::new(YoloNas::new(model_info, thresholds)),
      DetectorKind::RtDetr => Box::new(RtDetr::new(model_info, thresholds)),
      DetectorKind::RtDetrUltralytics => Box::new(RtDetrUltralytics::new(model_info, thresholds)),
    }
  }
}

impl FromStr for DetectorKind {
  type Err = DetectorError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    REGISTRY
      .iter()
      .find(|(name, _)| *name == s)
      .map(|(_, kind)| *kind)
      .ok_or_else(|| DetectorError::UnsupportedDetectorType(s.to_string()))
  }
}

impl fmt::Display for DetectorKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// 按名称创建检测器，名称未注册时返回 `UnsupportedDetectorType`
pub fn create_detector(
  detector_type: &str,
  model_info: &ModelInfo,
  thresholds: Thresholds,
) -> Result<Box<dyn Detector>, DetectorError> {
  let kind = detector_type.parse::<DetectorKind>().map_err(|e| {
    error!("{}", e);
    e
  })?;
  let detector = kind.build(model_info, thresholds);
  info!(
    "创建检测器: {} ({}), 置信度阈值 {}, NMS 阈值 {}",
    kind,
    detector.name(),
    thresholds.confidence,
    thresholds.nms
  );
  Ok(detector)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detector::tests::model_info;

  #[test]
  fn every_registered_name_round_trips() {
    for name in DetectorKind::names() {
      let kind: DetectorKind = name.parse().unwrap();
      assert_eq!(kind.as_str(), name);
    }
  }

  #[test]
  fn names_are_case_sensitive() {
    assert_eq!(
      "YOLOv5".parse::<DetectorKind>(),
      Err(DetectorError::UnsupportedDetectorType("YOLOv5".to_string()))
    );
  }

  #[test]
  fn anchor_based_and_anchor_free_names_pick_their_layouts() {
    use crate::{detection::FrameSize, tensor::TensorOutput};

    let info = model_info(&[]);
    let frame = FrameSize::new(640, 640);

    let v5 = create_detector("yolov5", &info, Thresholds::default()).unwrap();
    let rows = TensorOutput::from_f32(vec![320.0, 320.0, 64.0, 64.0, 0.9, 0.8], vec![1, 1, 6]).unwrap();
    let detections = v5.postprocess(&[rows], frame);
    assert_eq!(detections.len(), 1);
    assert!((detections[0].score - 0.72).abs() < 1e-5);

    let v8 = create_detector("yolov8", &info, Thresholds::default()).unwrap();
    let columns = TensorOutput::from_f32(vec![320.0, 320.0, 64.0, 64.0, 0.8], vec![1, 5, 1]).unwrap();
    let detections = v8.postprocess(&[columns], frame);
    assert_eq!(detections.len(), 1);
    assert!((detections[0].score - 0.8).abs() < 1e-6);
  }

  #[test]
  fn error_message_lists_registered_names() {
    let message = DetectorError::UnsupportedDetectorType("foo".into()).to_string();
    assert!(message.contains("foo"));
    assert!(message.contains("rtdetr_ultralytics"));
  }
}
