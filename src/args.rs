// 该文件是 Toukui （头盔） 项目的一部分。
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
use std::time::Duration;

use clap::{Parser, Subcommand};
use url::Url;

use toukui::client::{ClientConfig, DEFAULT_ENDPOINT};
use toukui::geometry::Size;

/// Toukui 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 推理服务地址
  #[arg(long, env = "TOUKUI_ENDPOINT", default_value = DEFAULT_ENDPOINT, value_name = "URL")]
  pub endpoint: Url,

  /// 请求超时（秒，0 表示不限制）
  #[arg(long, env = "TOUKUI_TIMEOUT_SECS", default_value = "30", value_name = "SECONDS")]
  pub timeout_secs: u64,

  /// 置信度阈值 (0.0 - 1.0)，不指定时使用服务端默认值
  #[arg(long, value_name = "THRESHOLD")]
  pub conf_threshold: Option<f32>,

  /// NMS IOU 阈值 (0.0 - 1.0)，不指定时使用服务端默认值
  #[arg(long, value_name = "THRESHOLD")]
  pub iou_threshold: Option<f32>,

  #[command(subcommand)]
  pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// 上传图像并渲染检测结果
  Detect {
    /// 图像文件路径
    #[arg(long, value_name = "FILE")]
    image: PathBuf,

    /// 显示尺寸，例如 `400x300`；指定时额外保存显示尺寸的叠加层 overlay.png
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    display: Option<Size>,

    /// 下载目录，标注图像保存为 annotated.png
    #[arg(long, default_value = ".", value_name = "DIR")]
    output: PathBuf,

    /// 标签字体 (TTF/OTF)，不指定时在常见系统位置查找
    #[arg(long, env = "TOUKUI_FONT", value_name = "FILE")]
    font: Option<PathBuf>,

    /// 不导出原始分辨率的标注图像
    #[arg(long)]
    no_export: bool,
  },
  /// 查询推理服务状态
  Health,
}

impl Args {
  pub fn client_config(&self) -> ClientConfig {
    let mut config = ClientConfig::new(self.endpoint.clone());
    if self.timeout_secs > 0 {
      config = config.timeout(Duration::from_secs(self.timeout_secs));
    }
    if let Some(conf) = self.conf_threshold {
      config = config.conf_threshold(conf);
    }
    if let Some(iou) = self.iou_threshold {
      config = config.iou_threshold(iou);
    }
    config
  }
}

fn parse_size(value: &str) -> Result<Size, String> {
  let (w, h) = value
    .split_once(['x', 'X'])
    .ok_or_else(|| format!("尺寸格式应为 WxH: {}", value))?;
  let width = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
  let height = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
  Ok(Size::new(width, height))
}
