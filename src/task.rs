// 该文件是 Kanjian （看见） 项目的一部分。
// src/task.rs - 检测任务
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

use std::{
  sync::mpsc::{self, Receiver},
  thread,
  time::{Duration, Instant},
};

use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::{
  detection::{Detection, FrameSize},
  detector::Detector,
  input::Frame,
  model::InferenceEngine,
  output::Render,
};

/// 检测器与推理引擎的组合：预处理 → 推理 → 后处理
pub struct DetectionModel<E> {
  detector: Box<dyn Detector>,
  engine: E,
}

impl<E: InferenceEngine> DetectionModel<E> {
  pub fn new(detector: Box<dyn Detector>, engine: E) -> Self {
    Self { detector, engine }
  }

  pub fn detector(&self) -> &dyn Detector {
    self.detector.as_ref()
  }

  pub fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, E::Error> {
    let input = self.detector.preprocess_image(image);
    let outputs = self.engine.infer(&input)?;
    debug!("推理引擎返回 {} 个输出头", outputs.len());
    Ok(self.detector.postprocess(&outputs, FrameSize::from(image)))
  }
}

pub trait Task<I, E, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: &DetectionModel<E>, output: O) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<
  IE: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<Frame, IE>>,
  E: InferenceEngine<Error = ME>,
  O: Render<Error = RE>,
> Task<I, E, O> for OneShotTask
{
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: &DetectionModel<E>, mut output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let now = Instant::now();
    let outcome = match input.next() {
      None => Err(anyhow::anyhow!("没有输入帧")),
      Some(frame) => frame
        .map_err(anyhow::Error::from)
        .and_then(|frame| render_frame(model, &frame, &mut output)),
    };
    finish_after(outcome, &mut output)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对单帧执行检测并交给输出
fn render_frame<E, O>(
  model: &DetectionModel<E>,
  frame: &Frame,
  output: &mut O,
) -> anyhow::Result<()>
where
  E: InferenceEngine,
  E::Error: std::error::Error + Sync + Send + 'static,
  O: Render,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  let now = Instant::now();
  let result = model.detect(&frame.image)?;
  let elapsed_a = now.elapsed();
  output.render_result(frame, &result)?;
  info!("推理完成，耗时: {:.2?} / {:.2?}", elapsed_a, now.elapsed());
  Ok(())
}

/// 无论帧循环是否出错都调用 `finish`；两者都出错时返回帧循环的错误
fn finish_after<T, O>(outcome: anyhow::Result<T>, output: &mut O) -> anyhow::Result<T>
where
  O: Render,
  O::Error: std::error::Error + Sync + Send + 'static,
{
  let finished = output.finish();
  match (outcome, finished) {
    (Ok(value), Ok(())) => Ok(value),
    (Ok(_), Err(e)) => Err(e.into()),
    (Err(e), Ok(())) => {
      warn!("任务中途失败，已写出此前各帧的结果");
      Err(e)
    }
    (Err(e), Err(finish_error)) => {
      error!("任务失败后写出结果也失败: {}", finish_error);
      Err(e)
    }
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<u64>,
  stop: Option<Receiver<()>>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<u64>) -> Self {
    self.frame_number = frame_number;
    self
  }

  /// 安装 Ctrl-C 处理器，收到信号后在当前帧结束时退出循环
  pub fn with_interrupt_handler(mut self) -> Result<Self, ctrlc::Error> {
    let (tx, rx) = mpsc::channel();

    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      let _ = tx.send(());
      thread::spawn(|| {
        thread::sleep(Duration::from_secs(30));
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })?;

    self.stop = Some(rx);
    Ok(self)
  }

  fn interrupted(&self) -> bool {
    self.stop.as_ref().is_some_and(|rx| rx.try_recv().is_ok())
  }
}

impl<
  IE: std::error::Error + Sync + Send + 'static,
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Result<Frame, IE>>,
  E: InferenceEngine<Error = ME>,
  O: Render<Error = RE>,
> Task<I, E, O> for ContinuousTask
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: &DetectionModel<E>, mut output: O) -> Result<(), Self::Error> {
    info!("开始任务...");
    let outcome = self.process_frames(input, model, &mut output);
    let processed = finish_after(outcome, &mut output)?;
    info!("任务完成，共处理 {} 帧，退出", processed);
    Ok(())
  }
}

impl ContinuousTask {
  fn process_frames<I, IE, E, O>(
    &self,
    input: I,
    model: &DetectionModel<E>,
    output: &mut O,
  ) -> anyhow::Result<u64>
  where
    IE: std::error::Error + Sync + Send + 'static,
    I: Iterator<Item = Result<Frame, IE>>,
    E: InferenceEngine,
    E::Error: std::error::Error + Sync + Send + 'static,
    O: Render,
    O::Error: std::error::Error + Sync + Send + 'static,
  {
    let mut processed = 0u64;
    for frame in input {
      let frame = frame?;
      processed += 1;
      info!("处理第 {} 帧图像", processed);
      render_frame(model, &frame, output)?;
      if self.frame_number.is_some_and(|n| processed >= n) {
        info!("达到指定帧数 {}, 退出任务循环", processed);
        break;
      }
      if self.interrupted() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }
    Ok(processed)
  }
}
