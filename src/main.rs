// 该文件是 Kanjian （看见） 项目的一部分。
// src/main.rs - 命令行入口
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

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kanjian::{
  AppConfig, ModelInfo, create_detector,
  input::InputSource,
  model::Engine,
  output::Outputs,
  task::{ContinuousTask, DetectionModel, OneShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let config = AppConfig::parse();
  config.validate()?;

  info!("Kanjian 目标检测");
  info!("检测器类型: {}", config.detector_type);
  info!("输入来源: {}", config.source.display());
  info!("模型文件路径: {}", config.weights.display());
  info!(
    "置信度阈值: {}, NMS 阈值: {}",
    config.confidence_threshold, config.nms_threshold
  );
  info!("GPU 推理: {}", if config.use_gpu { "启用" } else { "关闭" });

  let model_info = ModelInfo::from_config(&config)?;
  let detector = create_detector(&config.detector_type, &model_info, config.thresholds())?;
  let engine = Engine::open(&model_info)?;
  let model = DetectionModel::new(detector, engine);

  let input = InputSource::open(&config.source)?;
  let output = Outputs::new(
    config.output.clone(),
    config.report.clone(),
    config.font.clone(),
  )?;

  if matches!(input, InputSource::ImageFile(_)) {
    return OneShotTask.run_task(input, &model, output);
  }

  let frame_number = (config.max_frames > 0).then_some(config.max_frames);
  ContinuousTask::default()
    .with_frame_number(frame_number)
    .with_interrupt_handler()?
    .run_task(input, &model, output)
}
