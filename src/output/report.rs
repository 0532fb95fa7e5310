// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/report.rs - JSON 检测报告
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

use std::{fs::File, io::BufWriter, path::PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::{
  detection::{Detection, FrameSize},
  input::Frame,
  output::{OutputError, Render},
};

/// 单帧检测记录
#[derive(Debug, Clone, Serialize)]
pub struct FrameRecord {
  pub frame: u64,
  pub file: PathBuf,
  pub timestamp: DateTime<Utc>,
  pub frame_size: FrameSize,
  pub detections: Vec<Detection>,
}

/// 收集所有帧的检测记录，结束时写入 JSON 数组
pub struct ReportOutput {
  path: PathBuf,
  records: Vec<FrameRecord>,
}

impl ReportOutput {
  pub fn new(path: PathBuf) -> Self {
    Self {
      path,
      records: Vec::new(),
    }
  }

  pub fn records(&self) -> &[FrameRecord] {
    &self.records
  }
}

impl Render for ReportOutput {
  type Error = OutputError;

  fn render_result(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), Self::Error> {
    self.records.push(FrameRecord {
      frame: frame.index,
      file: frame.path.clone(),
      timestamp: Utc::now(),
      frame_size: FrameSize::from(&frame.image),
      detections: detections.to_vec(),
    });
    Ok(())
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let writer = BufWriter::new(File::create(&self.path)?);
    serde_json::to_writer_pretty(writer, &self.records)?;
    info!(
      "写入检测报告: {} ({} 帧)",
      self.path.display(),
      self.records.len()
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::BBox;
  use image::RgbImage;
  use serde_json::Value;

  #[test]
  fn report_lists_every_frame_with_its_detections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    let mut report = ReportOutput::new(path.clone());

    let frame = |index| Frame {
      image: RgbImage::new(8, 6),
      index,
      path: PathBuf::from(format!("frame{index}.png")),
    };
    let det = Detection {
      class_id: 2,
      label: Some("dog".to_string()),
      score: 0.5,
      bbox: BBox::new(1.0, 2.0, 3.0, 4.0),
    };

    report.render_result(&frame(0), &[det]).unwrap();
    report.render_result(&frame(1), &[]).unwrap();
    assert_eq!(report.records().len(), 2);
    report.finish().unwrap();

    let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let frames = json.as_array().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["frame"], 0);
    assert_eq!(frames[0]["file"], "frame0.png");
    assert_eq!(frames[0]["frame_size"]["width"], 8);
    assert_eq!(frames[0]["detections"][0]["label"], "dog");
    assert_eq!(frames[0]["detections"][0]["bbox"]["x2"], 3.0);
    assert!(frames[0]["timestamp"].is_string());
    assert!(frames[1]["detections"].as_array().unwrap().is_empty());
  }
}
