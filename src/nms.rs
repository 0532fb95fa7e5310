// 该文件是 Kanjian （看见） 项目的一部分。
// src/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;

use crate::detection::BBox;

/// 解码后、抑制前的候选框
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
  pub class_id: usize,
  pub score: f32,
  pub bbox: BBox,
}

impl Candidate {
  pub fn new(class_id: usize, score: f32, bbox: BBox) -> Self {
    Self {
      class_id,
      score,
      bbox,
    }
  }
}

/// 贪心非极大值抑制（不区分类别）
///
/// 按置信度降序稳定排序，置信度相同时先出现的优先；
/// 依次保留当前最高者，并丢弃与其 IoU 大于 `iou_threshold` 的其余候选。
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

  let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
  for candidate in candidates {
    if kept
      .iter()
      .all(|selected| selected.bbox.iou(&candidate.bbox) <= iou_threshold)
    {
      kept.push(candidate);
    }
  }
  kept
}
