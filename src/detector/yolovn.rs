// 该文件是 Kanjian （看见） 项目的一部分。
// src/detector/yolovn.rs - YOLOv5 至 YOLO11 系列检测器
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
  tensor::{Matrix, TensorOutput},
};

const NAME: &str = "YOLOv5-11";
const BOX_DIMS: usize = 4;

/// 输出布局参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YoloVnLayout {
  /// 是否带 objectness 列（v5/v7），带时与类别分数相乘
  pub objectness: bool,
  /// 是否为转置布局 [1, 4 + C, N]（v6 及以后），否则为 [1, N, 5 + C]
  pub transposed: bool,
}

impl YoloVnLayout {
  /// YOLOv5 / YOLOv7：[1, N, 5 + C]
  pub const ANCHOR_BASED: Self = Self {
    objectness: true,
    transposed: false,
  };

  /// YOLOv6 / v8 / v9 / 11：[1, 4 + C, N]
  pub const ANCHOR_FREE: Self = Self {
    objectness: false,
    transposed: true,
  };

  fn reserved_dims(&self) -> usize {
    BOX_DIMS + usize::from(self.objectness)
  }
}

/// 单输出头，坐标为网络输入像素下的 cx, cy, w, h，预处理使用 letterbox
pub struct YoloVn {
  core: DetectorCore,
  layout: YoloVnLayout,
}

impl YoloVn {
  pub fn new(model_info: &ModelInfo, thresholds: Thresholds, layout: YoloVnLayout) -> Self {
    Self {
      core: DetectorCore::new(model_info, thresholds),
      layout,
    }
  }

  pub fn layout(&self) -> YoloVnLayout {
    self.layout
  }
}

/// 按布局读取第 i 个候选的第 attr 个属性
struct Candidates<'a> {
  m: Matrix<'a>,
  transposed: bool,
}

impl Candidates<'_> {
  fn count(&self) -> usize {
    if self.transposed { self.m.cols } else { self.m.rows }
  }

  fn attrs(&self) -> usize {
    if self.transposed { self.m.rows } else { self.m.cols }
  }

  #[inline]
  fn get(&self, i: usize, attr: usize) -> f32 {
    if self.transposed {
      self.m.at(attr, i)
    } else {
      self.m.at(i, attr)
    }
  }

  fn best_class(&self, i: usize, from: usize, len: usize) -> (usize, f32) {
    if self.transposed {
      self.m.col_argmax(i, from, len)
    } else {
      self.m.row_argmax(i, from, len)
    }
  }
}

impl Detector for YoloVn {
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
    let view = Candidates {
      m: output.matrix(NAME),
      transposed: self.layout.transposed,
    };
    let reserved = self.layout.reserved_dims();
    assert!(
      view.attrs() > reserved,
      "{}: 每个候选至少需要 {} 个属性，实际形状为 {:?} ({:?})",
      NAME,
      reserved + 1,
      output.shape(),
      self.layout
    );
    let num_classes = view.attrs() - reserved;
    let letterbox = self.core.letterbox(frame_size);

    let mut candidates = Vec::new();
    for i in 0..view.count() {
      let objectness = if self.layout.objectness {
        let objectness = view.get(i, BOX_DIMS);
        if !self.core.accepts(objectness) {
          continue;
        }
        objectness
      } else {
        1.0
      };

      let (class_id, class_score) = view.best_class(i, reserved, num_classes);
      let score = objectness * class_score;
      if !self.core.accepts(score) {
        continue;
      }

      let bbox = BBox::from_cxcywh(view.get(i, 0), view.get(i, 1), view.get(i, 2), view.get(i, 3));
      candidates.push(Candidate::new(class_id, score, letterbox.to_frame(bbox)));
    }

    self.core.finish(NAME, candidates, frame_size)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detector::tests::{assert_bbox_near, model_info};

  #[test]
  fn anchor_based_multiplies_objectness() {
    let detector = YoloVn::new(
      &model_info(&["a", "b"]),
      Thresholds::new(0.5, 0.4),
      YoloVnLayout::ANCHOR_BASED,
    );
    #[rustfmt::skip]
    let data = vec![
      // cx, cy, w, h, obj, a, b
      320.0, 320.0, 64.0, 64.0, 0.9, 0.1, 0.8,
      100.0, 100.0, 20.0, 20.0, 0.6, 0.7, 0.0,
    ];
    let output = TensorOutput::from_f32(data, vec![1, 2, 7]).unwrap();
    let detections = detector.postprocess(&[output], FrameSize::new(640, 640));

    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].class_id, 1);
    assert!((detections[0].score - 0.72).abs() < 1e-5);
    assert_bbox_near(detections[0].bbox, BBox::new(288.0, 288.0, 352.0, 352.0));
  }

  #[test]
  fn anchor_free_reads_transposed_columns_and_undoes_letterbox() {
    let detector = YoloVn::new(
      &model_info(&["a"]),
      Thresholds::new(0.5, 0.4),
      YoloVnLayout::ANCHOR_FREE,
    );
    // [1, 5, 2]：两列候选
    #[rustfmt::skip]
    let data = vec![
      320.0, 10.0, // cx
      320.0, 10.0, // cy
      64.0, 4.0,   // w
      32.0, 4.0,   // h
      0.9, 0.2,    // class a
    ];
    let output = TensorOutput::from_f32(data, vec![1, 5, 2]).unwrap();
    // 1280x720 -> scale 0.5, pad_y 140
    let detections = detector.postprocess(&[output], FrameSize::new(1280, 720));

    assert_eq!(detections.len(), 1);
    assert_bbox_near(detections[0].bbox, BBox::new(576.0, 328.0, 704.0, 392.0));
  }

  #[test]
  fn outputs_are_identical_across_calls() {
    let detector = YoloVn::new(&model_info(&[]), Thresholds::default(), YoloVnLayout::ANCHOR_FREE);
    let data: Vec<f32> = (0..5 * 8)
      .map(|i| match i / 8 {
        0 | 1 => 100.0 + (i % 8) as f32 * 7.0,
        2 | 3 => 40.0,
        _ => 0.3 + (i % 8) as f32 * 0.05,
      })
      .collect();
    let output = TensorOutput::from_f32(data, vec![1, 5, 8]).unwrap();
    let frame = FrameSize::new(640, 480);

    let first = detector.postprocess(std::slice::from_ref(&output), frame);
    let second = detector.postprocess(std::slice::from_ref(&output), frame);
    assert!(!first.is_empty());
    assert_eq!(first, second);
  }

  #[test]
  #[should_panic(expected = "每个候选至少需要")]
  fn layout_mismatch_panics() {
    let detector = YoloVn::new(&model_info(&[]), Thresholds::default(), YoloVnLayout::ANCHOR_BASED);
    let output = TensorOutput::from_f32(vec![0.0; 5], vec![1, 1, 5]).unwrap();
    detector.postprocess(&[output], FrameSize::new(10, 10));
  }
}
