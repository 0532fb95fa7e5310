// 该文件是 Kanjian （看见） 项目的一部分。
// src/detector/rtdetr.rs - RT-DETR 检测器
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

const NAME: &str = "RT-DETR";
const BOX_DIMS: usize = 4;

/// 三个输出头，依次为 labels [1, N]（整型）、boxes [1, N, 4]、scores [1, N]
///
/// boxes 为网络输入像素下的角点。
pub struct RtDetr {
  core: DetectorCore,
}

impl RtDetr {
  pub fn new(model_info: &ModelInfo, thresholds: Thresholds) -> Self {
    Self {
      core: DetectorCore::new(model_info, thresholds),
    }
  }
}

impl Detector for RtDetr {
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
    let outputs = expect_outputs(NAME, outputs, 3);
    let (labels, scores) = (&outputs[0], &outputs[2]);
    let num_labels = labels.vector(NAME);
    let num_scores = scores.vector(NAME);
    let boxes = outputs[1].matrix(NAME);
    assert!(
      boxes.cols == BOX_DIMS && boxes.rows == num_labels && num_labels == num_scores,
      "{}: labels {:?} / boxes {:?} / scores {:?} 形状不一致",
      NAME,
      labels.shape(),
      outputs[1].shape(),
      scores.shape()
    );
    let (rx, ry) = self.core.stretch_ratio(frame_size);

    let mut candidates = Vec::new();
    for i in 0..num_scores {
      let score = scores.value(i);
      if !self.core.accepts(score) {
        continue;
      }
      let class_id = labels.value(i).max(0.0) as usize;
      let bbox = BBox::new(boxes.at(i, 0), boxes.at(i, 1), boxes.at(i, 2), boxes.at(i, 3))
        .scale(rx, ry);
      candidates.push(Candidate::new(class_id, score, bbox));
    }

    self.core.finish(NAME, candidates, frame_size)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detector::tests::{assert_bbox_near, model_info};

  #[test]
  fn reads_integer_labels_and_separate_scores() {
    let detector = RtDetr::new(&model_info(&["a", "b", "c"]), Thresholds::new(0.5, 0.4));
    let labels = TensorOutput::from_i64(vec![2, 0], vec![1, 2]).unwrap();
    let boxes = TensorOutput::from_f32(
      vec![320.0, 320.0, 640.0, 640.0, 0.0, 0.0, 32.0, 32.0],
      vec![1, 2, 4],
    )
    .unwrap();
    let scores = TensorOutput::from_f32(vec![0.95, 0.2], vec![1, 2]).unwrap();

    let detections = detector.postprocess(&[labels, boxes, scores], FrameSize::new(320, 320));
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_id, 2);
    assert_eq!(detections[0].label.as_deref(), Some("c"));
    assert_bbox_near(detections[0].bbox, BBox::new(160.0, 160.0, 320.0, 320.0));
  }

  #[test]
  #[should_panic(expected = "形状不一致")]
  fn inconsistent_heads_panic() {
    let detector = RtDetr::new(&model_info(&[]), Thresholds::default());
    let labels = TensorOutput::from_i64(vec![0, 0, 0], vec![1, 3]).unwrap();
    let boxes = TensorOutput::from_f32(vec![0.0; 8], vec![1, 2, 4]).unwrap();
    let scores = TensorOutput::from_f32(vec![0.9, 0.9], vec![1, 2]).unwrap();
    detector.postprocess(&[labels, boxes, scores], FrameSize::new(10, 10));
  }
}
