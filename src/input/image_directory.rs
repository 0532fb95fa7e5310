// 该文件是 Kanjian （看见） 项目的一部分。
// src/input/image_directory.rs - 图片目录输入
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

use std::{collections::VecDeque, path::{Path, PathBuf}};

use tracing::debug;

use super::{Frame, InputError, is_image_file, load_rgb};

/// 把目录中的图片按文件名排序后当作帧序列
pub struct ImageDirectoryInput {
  files: VecDeque<PathBuf>,
  index: u64,
}

impl ImageDirectoryInput {
  pub fn open(dir: &Path) -> Result<Self, InputError> {
    let mut files = std::fs::read_dir(dir)?
      .map(|entry| entry.map(|e| e.path()))
      .collect::<Result<Vec<_>, _>>()?;
    files.retain(|path| path.is_file() && is_image_file(path));
    files.sort();

    if files.is_empty() {
      return Err(InputError::EmptyDirectory(dir.to_path_buf()));
    }
    debug!("目录 {} 中共有 {} 张图片", dir.display(), files.len());

    Ok(Self {
      files: files.into(),
      index: 0,
    })
  }

  pub fn remaining(&self) -> usize {
    self.files.len()
  }
}

impl Iterator for ImageDirectoryInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.pop_front()?;
    let index = self.index;
    self.index += 1;
    Some(load_rgb(&path).map(|image| Frame { image, index, path }))
  }
}
