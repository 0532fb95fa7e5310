// 该文件是 Kanjian （看见） 项目的一部分。
// src/detection.rs - 检测结果定义
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

use serde::Serialize;

/// 原始帧尺寸（像素）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSize {
  pub width: u32,
  pub height: u32,
}

impl FrameSize {
  pub fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }
}

impl From<&image::RgbImage> for FrameSize {
  fn from(image: &image::RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self { width, height }
  }
}

/// 边界框，角点坐标 [x1, y1, x2, y2]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BBox {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
}

impl BBox {
  pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self { x1, y1, x2, y2 }
  }

  /// 由中心点和宽高构造
  pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32) -> Self {
    Self {
      x1: cx - w / 2.0,
      y1: cy - h / 2.0,
      x2: cx + w / 2.0,
      y2: cy + h / 2.0,
    }
  }

  pub fn width(&self) -> f32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> f32 {
    self.y2 - self.y1
  }

  pub fn area(&self) -> f32 {
    self.width().max(0.0) * self.height().max(0.0)
  }

  pub fn scale(&self, sx: f32, sy: f32) -> Self {
    Self {
      x1: self.x1 * sx,
      y1: self.y1 * sy,
      x2: self.x2 * sx,
      y2: self.y2 * sy,
    }
  }

  /// 角点顺序归一，再裁剪到帧范围 [0, width] x [0, height]
  pub fn clamp_to(&self, frame: FrameSize) -> Self {
    let (w, h) = (frame.width as f32, frame.height as f32);
    let (x1, x2) = (self.x1.min(self.x2), self.x1.max(self.x2));
    let (y1, y2) = (self.y1.min(self.y2), self.y1.max(self.y2));
    Self {
      x1: x1.clamp(0.0, w),
      y1: y1.clamp(0.0, h),
      x2: x2.clamp(0.0, w),
      y2: y2.clamp(0.0, h),
    }
  }

  pub fn intersection_area(&self, other: &BBox) -> f32 {
    let l = self.x1.max(other.x1);
    let r = self.x2.min(other.x2);
    let t = self.y1.max(other.y1);
    let b = self.y2.min(other.y2);
    (r - l).max(0.0) * (b - t).max(0.0)
  }

  /// 交并比，并集为零时返回 0
  pub fn iou(&self, other: &BBox) -> f32 {
    let intersection = self.intersection_area(other);
    let union = self.area() + other.area() - intersection;
    if union > 0.0 {
      intersection / union
    } else {
      0.0
    }
  }
}

/// 一个检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  /// 类别索引
  pub class_id: usize,
  /// 类别名称（如果标签集中存在）
  #[serde(skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  /// 置信度
  pub score: f32,
  /// 原始帧像素坐标下的边界框
  pub bbox: BBox,
}

/// 置信度阈值与 NMS IoU 阈值，构造后不再变化
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  pub confidence: f32,
  pub nms: f32,
}

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.4;

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      confidence: DEFAULT_CONFIDENCE_THRESHOLD,
      nms: DEFAULT_NMS_THRESHOLD,
    }
  }
}

impl Thresholds {
  pub fn new(confidence: f32, nms: f32) -> Self {
    Self { confidence, nms }
  }
}
