// 该文件是 Kanjian （看见） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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

use super::{Frame, InputError, load_rgb};

/// 单张图片输入，只产生一帧
pub struct ImageFileInput {
  path: Option<PathBuf>,
}

impl ImageFileInput {
  pub fn new(path: &Path) -> Self {
    Self {
      path: Some(path.to_path_buf()),
    }
  }
}

impl Iterator for ImageFileInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.path.take()?;
    Some(load_rgb(&path).map(|image| Frame {
      image,
      index: 0,
      path,
    }))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  #[test]
  fn yields_exactly_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("one.png");
    RgbImage::from_pixel(3, 2, Rgb([1, 2, 3])).save(&path).unwrap();

    let mut input = ImageFileInput::new(&path);
    let frame = input.next().unwrap().unwrap();
    assert_eq!(frame.image.dimensions(), (3, 2));
    assert_eq!(frame.index, 0);
    assert!(input.next().is_none());
  }

  #[test]
  fn unreadable_file_is_reported() {
    let mut input = ImageFileInput::new(Path::new("/definitely/not/here.png"));
    assert!(matches!(
      input.next(),
      Some(Err(InputError::ImageLoadError { .. }))
    ));
  }
}
