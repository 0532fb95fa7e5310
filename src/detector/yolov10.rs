// 该文件是 Kanjian （看见） 项目的一部分。
// src/detector/yolov10.rs - YOLOv10 端到端检测器
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

const NAME: &str = "YOLOv10";
// x1, y1, x2, y2, score, class_id
const ROW_DIMS: usize = 6;

/// 输出 [1, N, 6]，模型内部已经去重，坐标为网络输入像素下的角点
pub struct YoloV10 {
  core: DetectorCore,
}

impl YoloV10 {
  pub fn new(model_info: &ModelInfo, thresholds: Thresholds) -> Self {
    Self {
      core: DetectorCore::new(model_info, thresholds),
    }
  }
}

impl Detector for YoloV10 {
  fn name(&self) -> &'static str {
    NAME
  }

  fn thresholds(&self) -> Thresholds {
    self.core.thresholds()
  }

  fn preprocess_image(&self, image: &RgbImage) -> NetworkInput {
    self.core.preprocess(image, ResizeMode::Letterbox)
  }

  fn postprocess(&self, outputs: &[TensorOutput], frame_size: FrameSize) -> Vec<Detection> {
    let output = &expect_outputs(NAME, outputs, 1)[0];
    let m = output.matrix(NAME);
    assert_eq!(
      m.cols,
      ROW_DIMS,
      "{}: 每行应为 {} 个值，实际形状为 {:?}",
      NAME,
      ROW_DIMS,
      output.shape()
    );
    let letterbox = self.core.letterbox(frame_size);

    let mut candidates = Vec::new();
    for row in 0..m.rows {
      let score = m.at(row, 4);
      if !self.core.accepts(score) {
        continue;
      }
      let class_id = m.at(row, 5).max(0.0) as usize;
      let bbox = BBox::new(m.at(row, 0), m.at(row, 1), m.at(row, 2), m.at(row, 3));
      candidates.push(Candidate::new(class_id, score, letterbox.to_frame(bbox)));
    }

    self.core.finish(NAME, candidates, frame_size)
  }
}
