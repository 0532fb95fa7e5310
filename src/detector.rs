// 该文件是 Kanjian （看见） 项目的一部分。
// src/detector.rs - 检测器接口
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
use tracing::debug;

use crate::{
  detection::{Detection, FrameSize, Thresholds},
  frame::{Letterbox, NetworkInput, ResizeMode, stretch_ratio, to_network_input},
  model::ModelInfo,
  nms::{Candidate, non_max_suppression},
  tensor::TensorOutput,
};

mod rtdetr;
mod rtdetr_ultralytics;
mod setup;
mod yolonas;
mod yolov10;
mod yolov4;
mod yolovn;

pub use self::rtdetr::RtDetr;
pub use self::rtdetr_ultralytics::RtDetrUltralytics;
pub use self::setup::{DetectorError, DetectorKind, create_detector};
pub use self::yolonas::YoloNas;
pub use self::yolov4::YoloV4;
pub use self::yolov10::YoloV10;
pub use self::yolovn::{YoloVn, YoloVnLayout};

/// 检测器：把帧转换为网络输入，并把推理输出解码为检测结果
///
/// 检测器只持有构造时确定的配置，逐帧状态全部通过参数传入，
/// 因此同一个实例可以反复用于任意多帧。
pub trait Detector: Send + Sync {
  /// 检测器名称，用于日志
  fn name(&self) -> &'static str;

  fn thresholds(&self) -> Thresholds;

  /// 缩放、归一化并转为 NCHW 布局，不修改输入图像
  fn preprocess_image(&self, image: &RgbImage) -> NetworkInput;

  /// 解码输出张量，过滤低置信度候选，映射回原始帧坐标并做重叠抑制
  ///
  /// 输出张量的形状必须与该检测器对应的模型一致，否则直接 panic。
  fn postprocess(&self, outputs: &[TensorOutput], frame_size: FrameSize) -> Vec<Detection>;
}

/// 各检测器共享的配置与收尾逻辑
#[derive(Debug, Clone)]
pub(crate) struct DetectorCore {
  network_width: u32,
  network_height: u32,
  labels: Vec<String>,
  thresholds: Thresholds,
}

impl DetectorCore {
  pub(crate) fn new(model_info: &ModelInfo, thresholds: Thresholds) -> Self {
    Self {
      network_width: model_info.network_width(),
      network_height: model_info.network_height(),
      labels: model_info.labels().to_vec(),
      thresholds,
    }
  }

  pub(crate) fn thresholds(&self) -> Thresholds {
    self.thresholds
  }

  pub(crate) fn preprocess(&self, image: &RgbImage, mode: ResizeMode) -> NetworkInput {
    to_network_input(image, mode, self.network_width, self.network_height)
  }

  pub(crate) fn letterbox(&self, frame: FrameSize) -> Letterbox {
    Letterbox::new(frame, self.network_width, self.network_height)
  }

  pub(crate) fn stretch_ratio(&self, frame: FrameSize) -> (f32, f32) {
    stretch_ratio(frame, self.network_width, self.network_height)
  }

  #[inline]
  pub(crate) fn accepts(&self, score: f32) -> bool {
    score >= self.thresholds.confidence
  }

  /// 裁剪到帧范围、丢弃完全落在帧外的框、做 NMS 并附上类别名称
  pub(crate) fn finish(
    &self,
    name: &str,
    candidates: Vec<Candidate>,
    frame: FrameSize,
  ) -> Vec<Detection> {
    let decoded = candidates.len();
    let clamped: Vec<Candidate> = candidates
      .into_iter()
      .map(|c| Candidate {
        bbox: c.bbox.clamp_to(frame),
        ..c
      })
      .filter(|c| c.bbox.area() > 0.0)
      .collect();

    let kept = non_max_suppression(clamped, self.thresholds.nms);
    debug!(
      "{}: 候选 {} 个, 抑制后保留 {} 个",
      name,
      decoded,
      kept.len()
    );

    kept
      .into_iter()
      .map(|c| Detection {
        class_id: c.class_id,
        label: self.labels.get(c.class_id).cloned(),
        score: c.score,
        bbox: c.bbox,
      })
      .collect()
  }
}

/// 检查输出头数量，不足时 panic
pub(crate) fn expect_outputs<'a>(
  name: &str,
  outputs: &'a [TensorOutput],
  count: usize,
) -> &'a [TensorOutput] {
  assert!(
    outputs.len() >= count,
    "{}: 期望至少 {} 个输出头，实际为 {}",
    name,
    count,
    outputs.len()
  );
  outputs
}
