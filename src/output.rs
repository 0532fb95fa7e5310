// 该文件是 Kanjian （看见） 项目的一部分。
// src/output.rs - 输出定义
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

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::{detection::Detection, input::Frame};

pub trait Render {
  type Error;

  fn render_result(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), Self::Error>;

  /// 所有帧处理完毕后调用
  fn finish(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}

#[cfg(feature = "save_image_file")]
pub mod draw;

mod report;
pub use self::report::{FrameRecord, ReportOutput};

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::SaveImageFileOutput;

#[derive(Error, Debug)]
pub enum OutputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("JSON 错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("未启用图像输出功能，无法写入: {0}")]
  ImageOutputDisabled(PathBuf),
  #[error("无法解析字体文件: {0}")]
  InvalidFont(PathBuf),
}

/// 把每帧的检测结果写入日志
#[derive(Debug, Default)]
pub struct LogOutput {
  frames: u64,
  detections: usize,
}

impl Render for LogOutput {
  type Error = OutputError;

  fn render_result(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), Self::Error> {
    self.frames += 1;
    self.detections += detections.len();

    info!(
      "帧 {} ({}): 检测到 {} 个对象",
      frame.index,
      frame.path.display(),
      detections.len()
    );
    for det in detections {
      info!(
        "  - {}: {:.2}% at ({:.0}, {:.0}) - ({:.0}, {:.0})",
        det
          .label
          .clone()
          .unwrap_or_else(|| format!("class {}", det.class_id)),
        det.score * 100.0,
        det.bbox.x1,
        det.bbox.y1,
        det.bbox.x2,
        det.bbox.y2
      );
    }
    Ok(())
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    info!("总帧数: {}", self.frames);
    info!("总检测数: {}", self.detections);
    Ok(())
  }
}

/// 按配置组合的全部输出
pub struct Outputs {
  log: LogOutput,
  report: Option<ReportOutput>,
  #[cfg(feature = "save_image_file")]
  image: Option<SaveImageFileOutput>,
}

impl Outputs {
  /// `font` 仅在写标注图像时使用；未指定时查找系统字体
  pub fn new(
    image: Option<PathBuf>,
    report: Option<PathBuf>,
    font: Option<PathBuf>,
  ) -> Result<Self, OutputError> {
    #[cfg(feature = "save_image_file")]
    let image = match image {
      Some(path) => {
        let font = draw::resolve_font(font.as_deref())?;
        Some(SaveImageFileOutput::new(path, draw::Draw::with_font(font)))
      }
      None => None,
    };
    #[cfg(not(feature = "save_image_file"))]
    if let Some(path) = image {
      return Err(OutputError::ImageOutputDisabled(path));
    }
    #[cfg(not(feature = "save_image_file"))]
    let _ = font;

    Ok(Self {
      log: LogOutput::default(),
      report: report.map(ReportOutput::new),
      #[cfg(feature = "save_image_file")]
      image,
    })
  }
}

impl Render for Outputs {
  type Error = OutputError;

  fn render_result(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), Self::Error> {
    self.log.render_result(frame, detections)?;
    if let Some(report) = self.report.as_mut() {
      report.render_result(frame, detections)?;
    }
    #[cfg(feature = "save_image_file")]
    if let Some(image) = self.image.as_mut() {
      image.render_result(frame, detections)?;
    }
    Ok(())
  }

  fn finish(&mut self) -> Result<(), Self::Error> {
    self.log.finish()?;
    if let Some(report) = self.report.as_mut() {
      report.finish()?;
    }
    Ok(())
  }
}
