// 该文件是 Kanjian （看见） 项目的一部分。
// src/args.rs - 项目参数配置
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

use clap::Parser;
use thiserror::Error;

use crate::{
  detection::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_NMS_THRESHOLD, Thresholds},
  model::{DEFAULT_NETWORK_HEIGHT, DEFAULT_NETWORK_WIDTH},
};

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
  #[error("{name} 必须在 [0, 1] 范围内, 实际为 {value}")]
  ThresholdOutOfRange { name: &'static str, value: f32 },
  #[error("网络输入尺寸必须大于 0, 实际为 {width}x{height}")]
  InvalidNetworkSize { width: u32, height: u32 },
}

/// Kanjian 目标检测参数配置
#[derive(Parser, Debug, Clone)]
#[command(name = "kanjian", author, version, about, long_about = None)]
pub struct AppConfig {
  /// 检测器类型，例如 yolov5, yolov8, yolov10, yolonas, rtdetr, rtdetr_ultralytics
  #[arg(long = "type", value_name = "NAME")]
  pub detector_type: String,

  /// 输入来源（图片文件或图片目录）
  #[arg(long, value_name = "SOURCE")]
  pub source: PathBuf,

  /// 模型权重文件路径
  #[arg(long, value_name = "FILE")]
  pub weights: PathBuf,

  /// 模型配置文件路径（部分模型格式需要）
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 类别标签文件，每行一个名称
  #[arg(long, value_name = "FILE")]
  pub labels: Option<PathBuf>,

  /// 使用 GPU 推理
  #[arg(long = "use-gpu")]
  pub use_gpu: bool,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long = "min_confidence", default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence_threshold: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long = "nms_threshold", default_value_t = DEFAULT_NMS_THRESHOLD, value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 网络输入宽度
  #[arg(long = "input_width", default_value_t = DEFAULT_NETWORK_WIDTH, value_name = "PIXELS")]
  pub input_width: u32,

  /// 网络输入高度
  #[arg(long = "input_height", default_value_t = DEFAULT_NETWORK_HEIGHT, value_name = "PIXELS")]
  pub input_height: u32,

  /// 标注结果输出路径（图片文件或目录）
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<PathBuf>,

  /// 标注文本使用的 TrueType 字体（默认查找系统字体）
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,

  /// 检测结果 JSON 报告路径
  #[arg(long, value_name = "FILE")]
  pub report: Option<PathBuf>,

  /// 最大处理帧数（0 表示无限制）
  #[arg(long = "max_frames", default_value_t = 0, value_name = "COUNT")]
  pub max_frames: u64,
}

impl AppConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    for (name, value) in [
      ("min_confidence", self.confidence_threshold),
      ("nms_threshold", self.nms_threshold),
    ] {
      if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ThresholdOutOfRange { name, value });
      }
    }
    if self.input_width == 0 || self.input_height == 0 {
      return Err(ConfigError::InvalidNetworkSize {
        width: self.input_width,
        height: self.input_height,
      });
    }
    Ok(())
  }

  pub fn thresholds(&self) -> Thresholds {
    Thresholds::new(self.confidence_threshold, self.nms_threshold)
  }
}
