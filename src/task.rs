// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 推理任务
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
  sync::{
    Mutex, OnceLock, PoisonError,
    mpsc::{self, Receiver, Sender},
  },
  thread,
  time::Duration,
};
use tracing::{info, warn};

use crate::{
  config::Config, frame::ImageTensor, handpose::HandPose, output::Render, pipeline::HandBackend,
  result::HandResult,
};

pub trait Task<I, B: HandBackend, O>: Sized {
  type Error;
  fn run_task(
    self,
    input: I,
    handpose: &HandPose<B>,
    config: &Config,
    output: O,
  ) -> Result<(), Self::Error>;
}

pub struct OneShotTask;

impl<F, RE, I, B, O> Task<I, B, O> for OneShotTask
where
  F: ImageTensor,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  B: HandBackend,
  O: Render<F, [HandResult], Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    handpose: &HandPose<B>,
    config: &Config,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let now = std::time::Instant::now();
    let hands = handpose.predict(&frame, config)?;
    let elapsed = now.elapsed();
    info!("推理完成，检测到 {} 只手，耗时: {:.2?}", hands.len(), elapsed);
    output.render_result(&frame, &hands)?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(())
  }
}

/// 对同一帧重复推理，统计平均耗时
pub struct RepeatShotTask {
  repeat_times: usize,
}

impl Default for RepeatShotTask {
  fn default() -> Self {
    Self { repeat_times: 1000 }
  }
}

impl RepeatShotTask {
  pub fn with_repeat_times(mut self, repeat_times: usize) -> Self {
    self.repeat_times = repeat_times;
    self
  }
}

impl<F, RE, I, B, O> Task<I, B, O> for RepeatShotTask
where
  F: ImageTensor,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  B: HandBackend,
  O: Render<F, [HandResult], Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    handpose: &HandPose<B>,
    config: &Config,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");
    let mut times = Vec::with_capacity(self.repeat_times);
    let mut last = Vec::new();
    for i in 0..self.repeat_times {
      let now = std::time::Instant::now();
      last = handpose.predict(&frame, config)?;
      let elapsed = now.elapsed();
      info!("({})推理完成，耗时: {:.2?}", i, elapsed);
      times.push(elapsed);
    }
    output.render_result(&frame, &last)?;

    // 前两次包含预热，不计入平均
    let measured: Vec<Duration> = times.iter().skip(2).copied().collect();
    if !measured.is_empty() {
      warn!(
        "平均推理时间: {:.2?}",
        measured.iter().sum::<Duration>() / measured.len() as u32
      );
    }

    Ok(())
  }
}

#[derive(Default, Debug)]
pub struct ContinuousTask {
  frame_number: Option<usize>,
}

impl ContinuousTask {
  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }
}

/// 当前运行中任务的中断通道；处理函数全进程只注册一次
static INTERRUPT: Mutex<Option<Sender<()>>> = Mutex::new(None);
static INTERRUPT_HANDLER: OnceLock<Result<(), String>> = OnceLock::new();

fn interrupt_receiver() -> anyhow::Result<Receiver<()>> {
  INTERRUPT_HANDLER
    .get_or_init(|| {
      ctrlc::set_handler(|| {
        info!("收到中断信号，准备退出...");
        if let Some(tx) = INTERRUPT
          .lock()
          .unwrap_or_else(PoisonError::into_inner)
          .as_ref()
        {
          let _ = tx.send(());
        }
        thread::spawn(|| {
          thread::sleep(Duration::from_secs(30));
          warn!("强制退出程序");
          std::process::exit(1);
        });
      })
      .map_err(|e| e.to_string())
    })
    .clone()
    .map_err(anyhow::Error::msg)?;

  let (tx, rx) = mpsc::channel();
  *INTERRUPT.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
  Ok(rx)
}

impl ContinuousTask {
  /// 逐帧推理并返回处理的帧数；`stop` 收到信号时提前结束
  pub fn run_until<F, RE, I, B, O>(
    self,
    input: I,
    handpose: &HandPose<B>,
    config: &Config,
    output: O,
    stop: &Receiver<()>,
  ) -> anyhow::Result<usize>
  where
    F: ImageTensor,
    RE: std::error::Error + Sync + Send + 'static,
    I: Iterator<Item = F>,
    B: HandBackend,
    O: Render<F, [HandResult], Error = RE>,
  {
    let mut frame_index = 0;
    let mut now = std::time::Instant::now();
    for frame in input {
      frame_index += 1;
      info!("处理第 {} 帧图像", frame_index);
      let hands = handpose.predict(&frame, config)?;
      let elapsed_a = now.elapsed();
      output.render_result(&frame, &hands)?;
      let elapsed_b = now.elapsed();
      now = std::time::Instant::now();
      info!(
        "推理完成，检测到 {} 只手，耗时: {:.2?} / {:.2?}",
        hands.len(),
        elapsed_a,
        elapsed_b
      );
      if self.frame_number.is_some_and(|n| frame_index >= n) {
        info!("达到指定帧数 {}, 退出任务循环", frame_index);
        break;
      }
      if stop.try_recv().is_ok() {
        warn!("中断信号接收，退出任务循环");
        break;
      }
    }

    info!("任务完成，共处理 {} 帧", frame_index);
    Ok(frame_index)
  }
}

impl<F, RE, I, B, O> Task<I, B, O> for ContinuousTask
where
  F: ImageTensor,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = F>,
  B: HandBackend,
  O: Render<F, [HandResult], Error = RE>,
{
  type Error = anyhow::Error;

  fn run_task(
    self,
    input: I,
    handpose: &HandPose<B>,
    config: &Config,
    output: O,
  ) -> Result<(), Self::Error> {
    info!("开始任务...");
    let stop = interrupt_receiver()?;
    self.run_until(input, handpose, config, output, &stop)?;
    Ok(())
  }
}
