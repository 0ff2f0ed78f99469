// 该文件是 Shanan （山南西风） 项目的一部分。
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
use url::Url;

/// 手部姿态估计参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// JSON 配置文件，缺省字段使用默认值
  #[arg(long, value_name = "FILE")]
  pub config: Option<PathBuf>,

  /// 覆盖配置中的 modelBasePath
  #[arg(long, value_name = "DIR")]
  pub model_base: Option<String>,

  /// 录制的检测结果（JSON），由回放后端逐帧输出
  #[arg(long, value_name = "FILE")]
  pub recording: PathBuf,

  /// 输入来源
  /// - 图片: image:///path/to/file.png
  /// - 目录: folder:///path/to/dir
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// - 图片: image:///path/to/out.png[?record]
  /// - 目录: folder:///path/to/dir[?record][&always]
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 输出模型加载诊断信息
  #[arg(long)]
  pub debug: bool,

  /// 最大处理帧数（仅对目录输入有效）
  #[arg(long, value_name = "COUNT")]
  pub frames: Option<usize>,

  /// 对单帧重复推理指定次数并统计平均耗时
  #[arg(long, value_name = "TIMES")]
  pub repeat: Option<usize>,
}
