// 该文件是 Kanjian （看见） 项目的一部分。
// src/output/draw.rs - 在图像上绘制检测框
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

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use tracing::{info, warn};

use crate::{
  detection::{BBox, Detection},
  output::OutputError,
};

const BOX_THICKNESS: i32 = 2;
const SCORE_BAR_HEIGHT: u32 = 4;
const LABEL_FONT_SIZE: f32 = 14.0;
const LABEL_PADDING: i32 = 2;

// 未指定 --font 时依次尝试的系统字体
const SYSTEM_FONTS: [&str; 6] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
  "C:\\Windows\\Fonts\\arial.ttf",
];

// 按类别循环使用的颜色
const PALETTE: [[u8; 3]; 10] = [
  [255, 56, 56],
  [255, 157, 151],
  [255, 112, 31],
  [255, 178, 29],
  [207, 210, 49],
  [72, 249, 10],
  [26, 147, 52],
  [0, 212, 187],
  [52, 69, 147],
  [0, 0, 255],
];

/// 读取 TrueType/OpenType 字体文件
pub fn load_font(path: &Path) -> Result<FontVec, OutputError> {
  let data = std::fs::read(path)?;
  FontVec::try_from_vec(data).map_err(|_| OutputError::InvalidFont(path.to_path_buf()))
}

/// 在常见的系统字体位置查找可用字体
pub fn find_system_font() -> Option<(PathBuf, FontVec)> {
  SYSTEM_FONTS.iter().map(PathBuf::from).find_map(|path| {
    if !path.is_file() {
      return None;
    }
    load_font(&path).ok().map(|font| (path, font))
  })
}

/// 显式指定的字体必须可用；否则回退到系统字体，找不到时只画框和得分条
pub fn resolve_font(explicit: Option<&Path>) -> Result<Option<FontVec>, OutputError> {
  if let Some(path) = explicit {
    let font = load_font(path)?;
    info!("使用字体: {}", path.display());
    return Ok(Some(font));
  }
  match find_system_font() {
    Some((path, font)) => {
      info!("使用系统字体: {}", path.display());
      Ok(Some(font))
    }
    None => {
      warn!("未找到可用字体，标注图像中将不显示类别与得分文本");
      Ok(None)
    }
  }
}

pub struct Draw {
  thickness: i32,
  score_bar_height: u32,
  font_size: f32,
  font: Option<FontVec>,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      thickness: BOX_THICKNESS,
      score_bar_height: SCORE_BAR_HEIGHT,
      font_size: LABEL_FONT_SIZE,
      font: None,
    }
  }
}

pub fn class_color(class_id: usize) -> Rgb<u8> {
  Rgb(PALETTE[class_id % PALETTE.len()])
}

fn label_text(det: &Detection) -> String {
  match &det.label {
    Some(label) => format!("{} {:.2}", label, det.score),
    None => format!("class {} {:.2}", det.class_id, det.score),
  }
}

impl Draw {
  pub fn with_font(font: Option<FontVec>) -> Self {
    Self {
      font,
      ..Self::default()
    }
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
    for det in detections {
      let color = class_color(det.class_id);
      let Some((x_min, y_min, x_max, _)) = self.draw_bbox(image, &det.bbox, color) else {
        continue;
      };
      match &self.font {
        Some(font) => self.draw_label(image, font, &label_text(det), (x_min, y_min), color),
        None => self.draw_score_bar(image, det.score, (x_min, y_min, x_max), color),
      }
    }
  }

  /// 绘制边框，返回裁剪到图像内的像素坐标；退化的框不绘制
  fn draw_bbox(
    &self,
    image: &mut RgbImage,
    bbox: &BBox,
    color: Rgb<u8>,
  ) -> Option<(i32, i32, i32, i32)> {
    let (w, h) = (image.width() as i32, image.height() as i32);
    if w == 0 || h == 0 {
      return None;
    }

    let x_min = (bbox.x1.floor() as i32).clamp(0, w - 1);
    let y_min = (bbox.y1.floor() as i32).clamp(0, h - 1);
    let x_max = (bbox.x2.ceil() as i32).clamp(0, w - 1);
    let y_max = (bbox.y2.ceil() as i32).clamp(0, h - 1);

    if x_min >= x_max || y_min >= y_max {
      return None;
    }

    for t in 0..self.thickness {
      let (x0, y0) = (x_min + t, y_min + t);
      let (x1, y1) = (x_max - t, y_max - t);
      if x0 >= x1 || y0 >= y1 {
        break;
      }
      let rect = Rect::at(x0, y0).of_size((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
      draw_hollow_rect_mut(image, rect, color);
    }
    Some((x_min, y_min, x_max, y_max))
  }

  /// 没有字体时在框上沿画出长度与得分成比例的色条
  fn draw_score_bar(
    &self,
    image: &mut RgbImage,
    score: f32,
    (x_min, y_min, x_max): (i32, i32, i32),
    color: Rgb<u8>,
  ) {
    let bar_width = ((x_max - x_min + 1) as f32 * score.clamp(0.0, 1.0)).round() as u32;
    let bar_y = (y_min - self.score_bar_height as i32).max(0);
    if bar_width > 0 {
      let rect = Rect::at(x_min, bar_y).of_size(bar_width, self.score_bar_height);
      draw_filled_rect_mut(image, rect, color);
    }
  }

  /// 在框上方绘制带类别颜色背景的白色标签文本
  fn draw_label(
    &self,
    image: &mut RgbImage,
    font: &FontVec,
    label: &str,
    (x_min, y_min): (i32, i32),
    color: Rgb<u8>,
  ) {
    let scale = PxScale::from(self.font_size);
    let (text_width, text_height) = text_size(scale, font, label);
    let label_height = text_height as i32 + 2 * LABEL_PADDING;
    let label_x = x_min;
    let label_y = (y_min - label_height).max(0);

    let max_width = (image.width() as i32 - label_x).max(0);
    let label_width = (text_width as i32 + 2 * LABEL_PADDING).min(max_width);
    if label_width <= 0 || label_height <= 0 {
      return;
    }

    let rect = Rect::at(label_x, label_y).of_size(label_width as u32, label_height as u32);
    draw_filled_rect_mut(image, rect, color);
    draw_text_mut(
      image,
      Rgb([255, 255, 255]),
      label_x + LABEL_PADDING,
      label_y + LABEL_PADDING,
      scale,
      font,
      label,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn detection(class_id: usize, bbox: BBox) -> Detection {
    Detection {
      class_id,
      label: None,
      score: 1.0,
      bbox,
    }
  }

  #[test]
  fn draws_box_edges_in_class_color() {
    let mut image = RgbImage::new(50, 50);
    let det = detection(3, BBox::new(10.0, 20.0, 30.0, 40.0));
    Draw::default().draw_detections(&mut image, &[det]);

    let color = class_color(3);
    assert_eq!(*image.get_pixel(10, 30), color);
    assert_eq!(*image.get_pixel(30, 30), color);
    assert_eq!(*image.get_pixel(20, 40), color);
    // 框内部保持不变
    assert_eq!(*image.get_pixel(20, 30), Rgb([0, 0, 0]));
  }

  #[test]
  fn out_of_frame_box_is_clamped_without_panicking() {
    let mut image = RgbImage::new(20, 20);
    let det = detection(0, BBox::new(-10.0, -10.0, 100.0, 100.0));
    Draw::default().draw_detections(&mut image, &[det]);
    assert_eq!(*image.get_pixel(19, 10), class_color(0));
  }

  #[test]
  fn degenerate_box_draws_nothing() {
    let mut image = RgbImage::new(20, 20);
    let det = detection(0, BBox::new(5.0, 5.0, 5.0, 5.0));
    Draw::default().draw_detections(&mut image, &[det]);
    assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
  }

  #[test]
  fn label_text_names_class_and_score() {
    let mut det = detection(2, BBox::new(0.0, 0.0, 1.0, 1.0));
    det.score = 0.876;
    assert_eq!(label_text(&det), "class 2 0.88");
    det.label = Some("car".to_string());
    assert_eq!(label_text(&det), "car 0.88");
  }

  #[test]
  fn invalid_font_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ttf");
    std::fs::write(&path, b"definitely not a font").unwrap();
    assert!(matches!(load_font(&path), Err(OutputError::InvalidFont(p)) if p == path));
    assert!(resolve_font(Some(&path)).is_err());
    assert!(matches!(
      resolve_font(Some(&dir.path().join("missing.ttf"))),
      Err(OutputError::IoError(_))
    ));
  }

  #[test]
  fn label_is_drawn_above_box_when_font_is_available() {
    // 没有系统字体的环境只能验证得分条路径
    let Some((_, font)) = find_system_font() else {
      return;
    };
    let draw = Draw::with_font(Some(font));
    assert!(draw.has_font());

    let mut image = RgbImage::new(120, 80);
    let mut det = detection(1, BBox::new(10.0, 40.0, 100.0, 70.0));
    det.label = Some("person".to_string());
    draw.draw_detections(&mut image, &[det]);

    let color = class_color(1);
    let above = (0..40).flat_map(|y| (10..100).map(move |x| (x, y)));
    let (background, text): (Vec<_>, Vec<_>) = above
      .map(|(x, y)| *image.get_pixel(x, y))
      .filter(|p| *p != Rgb([0, 0, 0]))
      .partition(|p| *p == color);
    assert!(!background.is_empty(), "标签背景未绘制");
    assert!(!text.is_empty(), "标签文本未绘制");
  }
}
