// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/save_image_file.rs - 保存标注后的图像文件
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

use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::info;

use crate::{
  detection::Detection,
  input::{Frame, is_image_file},
  output::{OutputError, Render, draw::Draw},
};

/// 路径带有图片扩展名时写入单个文件（后续帧覆盖），否则视为目录，每帧一张图片
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

impl SaveImageFileOutput {
  pub fn new(path: PathBuf, draw: Draw) -> Self {
    Self { path, draw }
  }

  fn target_for(&self, frame: &Frame) -> PathBuf {
    if is_image_file(&self.path) {
      return self.path.clone();
    }
    let stem = frame
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| format!("frame_{:06}", frame.index));
    self.path.join(format!("{stem}.png"))
  }

  fn save_image(&self, image: &RgbImage, path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(path)?;

    info!("保存图像到文件: {}", path.display());
    Ok(())
  }
}

impl Render for SaveImageFileOutput {
  type Error = OutputError;

  fn render_result(&mut self, frame: &Frame, detections: &[Detection]) -> Result<(), Self::Error> {
    let mut image = frame.image.clone();
    self.draw.draw_detections(&mut image, detections);
    let target = self.target_for(frame);
    self.save_image(&image, &target)
  }
}
