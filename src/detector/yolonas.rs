// 该文件是 Kanjian （看见） 项目的一部分。
// src/detector/yolonas.rs - YOLO-NAS 检测器
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

use image::RgbImage;

use super::{Detector, DetectorCore, expect_outputs};
use crate::{
  detection::{BBox, Detection, FrameSize, Thresholds},
  frame::{NetworkInput, ResizeMode},
  model::ModelInfo,
  nms::Candidate,
  tensor::TensorOutput,
};

const NAME: &str = "YOLO-NAS";
const BOX_DIMS: usize = 4;

/// 两个输出头：boxes [1, N, 4]（网络像素下的角点）与 scores [1, N, C]
pub struct YoloNas {
  core: DetectorCore,
}

impl YoloNas {
  pub fn new(model_info: &ModelInfo, thresholds: Thresholds) -> Self {
    Self {
      core: DetectorCore::new(model_info, thresholds),
    }
  }
}

impl Detector for YoloNas {
  fn name(&self) -> &'static str {
    NAME
  }

  fn thresholds(&self) -> Thresholds {
    self.core.thresholds()
  }

  fn preprocess_image(&self, image: &RgbImage) -> NetworkInput {
    self.core.preprocess(image, ResizeMode::Stretch)
  }

  fn postprocess(&self, outputs: &[TensorOutput], frame_size: FrameSize) -> Vec<Detection> {
    let outputs = expect_outputs(NAME, outputs, 2);
    let boxes = outputs[0].matrix(NAME);
    let scores = outputs[1].matrix(NAME);
    assert!(
      boxes.cols == BOX_DIMS && boxes.rows == scores.rows,
      "{}: boxes 形状 {:?} 与 scores 形状 {:?} 不匹配",
      NAME,
      outputs[0].shape(),
      outputs[1].shape()
    );
    let (rx, ry) = self.core.stretch_ratio(frame_size);

    let mut candidates = Vec::new();
    for row in 0..scores.rows {
      let (class_id, score) = scores.row_argmax(row, 0, scores.cols);
      if !self.core.accepts(score) {
        continue;
      }
      let bbox = BBox::new(
        boxes.at(row, 0),
        boxes.at(row, 1),
        boxes.at(row, 2),
        boxes.at(row, 3),
      )
      .scale(rx, ry);
      candidates.push(Candidate::new(class_id, score, bbox));
    }

    self.core.finish(NAME, candidates, frame_size)
  }
}
