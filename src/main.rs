// 该文件是 Shanan （山南西风） 项目的一部分。
// src/main.rs - 项目主程序
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

mod args;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use shanan_handpose::{
  Config, FromUrl, HandPose,
  backend::{Recording, ReplayBackend},
  input::InputWrapper,
  output::OutputWrapper,
  task::{ContinuousTask, OneShotTask, RepeatShotTask, Task},
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  let mut config = match &args.config {
    Some(path) => Config::from_json_file(path)?,
    None => Config::default(),
  };
  if let Some(base) = &args.model_base {
    config = config.with_model_base_path(base.clone());
  }
  if args.debug {
    config = config.with_debug(true);
  }

  info!("模型路径前缀: {}", config.model_base_path);
  info!("录制文件: {}", args.recording.display());
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let recording = Recording::from_json_file(&args.recording)?;
  info!("录制共 {} 帧", recording.len());

  let handpose = HandPose::new(ReplayBackend::new(recording));
  let report = handpose.load(&config);
  if report.detector.is_failed() {
    warn!("检测模型不可用，结果将为空");
  }

  let input = InputWrapper::from_url(&args.input)?;
  let output = OutputWrapper::from_url(&args.output)?;

  match args.repeat {
    Some(times) => RepeatShotTask::default()
      .with_repeat_times(times)
      .run_task(input, &handpose, &config, output),
    None if input.is_single_shot() => OneShotTask.run_task(input, &handpose, &config, output),
    None => ContinuousTask::default()
      .with_frame_number(args.frames)
      .run_task(input, &handpose, &config, output),
  }
}
