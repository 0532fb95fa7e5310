// 该文件是 Kanjian （看见） 项目的一部分。
// src/input.rs - 图像输入
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
use thiserror::Error;
use tracing::{error, info};

mod image_directory;
mod read_image_file;

pub use self::image_directory::ImageDirectoryInput;
pub use self::read_image_file::ImageFileInput;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

#[derive(Error, Debug)]
pub enum InputError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {path}: {source}")]
  ImageLoadError {
    path: PathBuf,
    source: image::ImageError,
  },
  #[error("不支持的输入来源: {0}（仅支持图片文件或图片目录）")]
  UnsupportedSource(PathBuf),
  #[error("目录中没有图片: {0}")]
  EmptyDirectory(PathBuf),
}

/// 一帧输入
#[derive(Debug, Clone)]
pub struct Frame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 来源文件
  pub path: PathBuf,
}

/// 是否为支持的图片文件扩展名
pub fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|ext| ext.to_str())
    .map(|ext| ext.to_ascii_lowercase())
    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

pub(crate) fn load_rgb(path: &Path) -> Result<RgbImage, InputError> {
  let image = image::open(path).map_err(|source| {
    error!("无法加载图像 {}: {}", path.display(), source);
    InputError::ImageLoadError {
      path: path.to_path_buf(),
      source,
    }
  })?;
  Ok(image.to_rgb8())
}

/// 输入来源
pub enum InputSource {
  ImageFile(ImageFileInput),
  ImageDirectory(ImageDirectoryInput),
}

impl InputSource {
  /// 根据路径打开输入来源：目录按文件名顺序读取其中的图片，否则读取单张图片
  pub fn open(source: &Path) -> Result<Self, InputError> {
    if source.is_dir() {
      info!("打开图片目录: {}", source.display());
      return Ok(InputSource::ImageDirectory(ImageDirectoryInput::open(source)?));
    }

    if is_image_file(source) {
      info!("打开图片文件: {}", source.display());
      return Ok(InputSource::ImageFile(ImageFileInput::new(source)));
    }

    error!("不支持的输入来源: {}", source.display());
    Err(InputError::UnsupportedSource(source.to_path_buf()))
  }
}

impl Iterator for InputSource {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputSource::ImageFile(input) => input.next(),
      InputSource::ImageDirectory(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recognises_image_extensions_case_insensitively() {
    assert!(is_image_file(Path::new("a/b.JPG")));
    assert!(is_image_file(Path::new("frame.png")));
    assert!(!is_image_file(Path::new("input.mp4")));
    assert!(!is_image_file(Path::new("noext")));
  }

  #[test]
  fn video_files_are_unsupported() {
    let err = InputSource::open(Path::new("input.mp4")).err().unwrap();
    assert!(matches!(err, InputError::UnsupportedSource(_)));
  }
}
