// 该文件是 Kanjian （看见） 项目的一部分。
// src/frame.rs - 网络输入张量与缩放几何
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

use image::{Rgb, RgbImage, imageops};

use crate::detection::{BBox, FrameSize};

const RGB_CHANNELS: usize = 3;
const PIXEL_MAX: f32 = 255.0;
const LETTERBOX_FILL: u8 = 114;

/// 送入推理引擎的网络输入：批次为 1 的 NCHW 浮点张量，RGB 顺序，取值 [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkInput {
  data: Box<[f32]>,
  width: u32,
  height: u32,
}

impl From<&RgbImage> for NetworkInput {
  fn from(image: &RgbImage) -> Self {
    let (width, height) = image.dimensions();
    let plane = (width as usize) * (height as usize);
    let mut data = vec![0f32; RGB_CHANNELS * plane];

    for (w, h, pixel) in image.enumerate_pixels() {
      let offset = (h as usize) * (width as usize) + (w as usize);
      for c in 0..RGB_CHANNELS {
        data[c * plane + offset] = pixel[c] as f32 / PIXEL_MAX;
      }
    }

    Self {
      data: data.into_boxed_slice(),
      width,
      height,
    }
  }
}

impl NetworkInput {
  pub fn as_nchw(&self) -> &[f32] {
    &self.data
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  /// [1, 3, H, W]
  pub fn shape(&self) -> [usize; 4] {
    [1, RGB_CHANNELS, self.height as usize, self.width as usize]
  }

  pub fn pixel(&self, c: usize, y: u32, x: u32) -> f32 {
    let plane = (self.width as usize) * (self.height as usize);
    self.data[c * plane + (y as usize) * (self.width as usize) + (x as usize)]
  }
}

/// 预处理时的缩放方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMode {
  /// 直接拉伸到网络尺寸
  Stretch,
  /// 保持长宽比缩放并居中填充
  Letterbox,
}

/// 保持长宽比缩放的几何参数，前处理与后处理各自由帧尺寸算出同一个值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: f32,
  pub resized_width: u32,
  pub resized_height: u32,
  pub pad_x: u32,
  pub pad_y: u32,
}

impl Letterbox {
  pub fn new(frame: FrameSize, network_width: u32, network_height: u32) -> Self {
    let scale = (network_width as f32 / frame.width.max(1) as f32)
      .min(network_height as f32 / frame.height.max(1) as f32);
    let resized_width = ((frame.width as f32 * scale).round() as u32).clamp(1, network_width);
    let resized_height = ((frame.height as f32 * scale).round() as u32).clamp(1, network_height);
    Self {
      scale,
      resized_width,
      resized_height,
      pad_x: (network_width - resized_width) / 2,
      pad_y: (network_height - resized_height) / 2,
    }
  }

  /// 网络输入像素坐标 -> 原始帧像素坐标
  pub fn to_frame(&self, bbox: BBox) -> BBox {
    let (px, py) = (self.pad_x as f32, self.pad_y as f32);
    BBox {
      x1: (bbox.x1 - px) / self.scale,
      y1: (bbox.y1 - py) / self.scale,
      x2: (bbox.x2 - px) / self.scale,
      y2: (bbox.y2 - py) / self.scale,
    }
  }
}

/// 拉伸缩放时从网络坐标映射回帧坐标的比例
pub fn stretch_ratio(frame: FrameSize, network_width: u32, network_height: u32) -> (f32, f32) {
  (
    frame.width as f32 / network_width as f32,
    frame.height as f32 / network_height as f32,
  )
}

/// 按缩放方式把图像转换为网络输入，不修改原图
pub fn to_network_input(
  image: &RgbImage,
  mode: ResizeMode,
  network_width: u32,
  network_height: u32,
) -> NetworkInput {
  match mode {
    ResizeMode::Stretch => {
      let resized = imageops::resize(
        image,
        network_width,
        network_height,
        imageops::FilterType::Triangle,
      );
      NetworkInput::from(&resized)
    }
    ResizeMode::Letterbox => {
      let geometry = Letterbox::new(FrameSize::from(image), network_width, network_height);
      let resized = imageops::resize(
        image,
        geometry.resized_width,
        geometry.resized_height,
        imageops::FilterType::Triangle,
      );
      let mut canvas = RgbImage::from_pixel(
        network_width,
        network_height,
        Rgb([LETTERBOX_FILL; RGB_CHANNELS]),
      );
      imageops::overlay(
        &mut canvas,
        &resized,
        geometry.pad_x as i64,
        geometry.pad_y as i64,
      );
      NetworkInput::from(&canvas)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn converts_to_planar_scaled_rgb() {
    let mut image = RgbImage::new(2, 1);
    image.put_pixel(0, 0, Rgb([255, 0, 0]));
    image.put_pixel(1, 0, Rgb([0, 51, 255]));

    let input = NetworkInput::from(&image);
    assert_eq!(input.shape(), [1, 3, 1, 2]);
    assert_eq!(input.as_nchw(), &[1.0, 0.0, 0.0, 0.2, 0.0, 1.0]);
  }

  #[test]
  fn letterbox_pads_the_short_side() {
    let geometry = Letterbox::new(FrameSize::new(1280, 720), 640, 640);
    assert!((geometry.scale - 0.5).abs() < 1e-6);
    assert_eq!((geometry.resized_width, geometry.resized_height), (640, 360));
    assert_eq!((geometry.pad_x, geometry.pad_y), (0, 140));

    let back = geometry.to_frame(BBox::new(0.0, 140.0, 640.0, 500.0));
    assert_eq!(back, BBox::new(0.0, 0.0, 1280.0, 720.0));
  }

  #[test]
  fn preprocess_keeps_source_untouched_and_fills_padding() {
    let image = RgbImage::from_pixel(4, 2, Rgb([255, 255, 255]));
    let before = image.clone();

    let input = to_network_input(&image, ResizeMode::Letterbox, 4, 4);
    assert_eq!(image, before);
    assert_eq!(input.shape(), [1, 3, 4, 4]);
    // 上方填充行
    assert!((input.pixel(0, 0, 0) - 114.0 / 255.0).abs() < 1e-6);
    // 中间为原图内容
    assert!((input.pixel(0, 1, 1) - 1.0).abs() < 1e-6);
  }

  #[test]
  fn stretch_resizes_to_network_size() {
    let image = RgbImage::from_pixel(10, 5, Rgb([0, 0, 0]));
    let input = to_network_input(&image, ResizeMode::Stretch, 8, 8);
    assert_eq!((input.width(), input.height()), (8, 8));
    assert_eq!(stretch_ratio(FrameSize::new(10, 5), 8, 8), (1.25, 0.625));
  }
}
