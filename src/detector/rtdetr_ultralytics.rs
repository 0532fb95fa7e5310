// 该文件是 Kanjian （看见） 项目的一部分。
// src/detector/rtdetr_ultralytics.rs - Ultralytics 导出的 RT-DETR 检测器
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

const NAME: &str = "RT-DETR (Ultralytics)";
const BOX_DIMS: usize = 4;

/// 单输出头 [1, N, 4 + C]：前 4 个值是归一化的 cx, cy, w, h，其余为各类别分数
pub struct RtDetrUltralytics {
  core: DetectorCore,
}

impl RtDetrUltralytics {
  pub fn new(model_info: &ModelInfo, thresholds: Thresholds) -> Self {
    Self {
      core: DetectorCore::new(model_info, thresholds),
    }
  }
}

impl Detector for RtDetrUltralytics {
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
    let output = &expect_outputs(NAME, outputs, 1)[0];
    let m = output.matrix(NAME);
    assert!(
      m.cols > BOX_DIMS,
      "{}: 每行至少需要 {} 个值，实际形状为 {:?}",
      NAME,
      BOX_DIMS + 1,
      output.shape()
    );
    let num_classes = m.cols - BOX_DIMS;
    let (fw, fh) = (frame_size.width as f32, frame_size.height as f32);

    let mut candidates = Vec::new();
    for row in 0..m.rows {
      let (class_id, score) = m.row_argmax(row, BOX_DIMS, num_classes);
      if !self.core.accepts(score) {
        continue;
      }

      let bbox = BBox::from_cxcywh(m.at(row, 0), m.at(row, 1), m.at(row, 2), m.at(row, 3))
        .scale(fw, fh);
      candidates.push(Candidate::new(class_id, score, bbox));
    }

    self.core.finish(NAME, candidates, frame_size)
  }
}
