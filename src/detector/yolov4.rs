// 该文件是 Kanjian （看见） 项目的一部分。
// src/detector/yolov4.rs - Darknet YOLOv4 检测器
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

const NAME: &str = "YOLOv4";
// cx, cy, w, h, objectness
const RESERVED_DIMS: usize = 5;

/// Darknet 风格的多输出头，每个头 [N, 5 + C]
///
/// 坐标为归一化的 cx, cy, w, h；类别分数已经乘过 objectness，
/// 因此第 5 列只用于布局，不参与打分。
pub struct YoloV4 {
  core: DetectorCore,
}

impl YoloV4 {
  pub fn new(model_info: &ModelInfo, thresholds: Thresholds) -> Self {
    Self {
      core: DetectorCore::new(model_info, thresholds),
    }
  }
}

impl Detector for YoloV4 {
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
    let (fw, fh) = (frame_size.width as f32, frame_size.height as f32);
    let mut candidates = Vec::new();

    for output in expect_outputs(NAME, outputs, 1) {
      let m = output.matrix(NAME);
      assert!(
        m.cols > RESERVED_DIMS,
        "{}: 每行至少需要 {} 个值，实际形状为 {:?}",
        NAME,
        RESERVED_DIMS + 1,
        output.shape()
      );
      let num_classes = m.cols - RESERVED_DIMS;

      for row in 0..m.rows {
        let (class_id, score) = m.row_argmax(row, RESERVED_DIMS, num_classes);
        if !self.core.accepts(score) {
          continue;
        }
        let bbox = BBox::from_cxcywh(m.at(row, 0), m.at(row, 1), m.at(row, 2), m.at(row, 3))
          .scale(fw, fh);
        candidates.push(Candidate::new(class_id, score, bbox));
      }
    }

    self.core.finish(NAME, candidates, frame_size)
  }
}
