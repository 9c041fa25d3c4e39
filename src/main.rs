// 该文件是 Toukui （头盔） 项目的一部分。
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

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::{Args, Command};
use toukui::client::InferenceClient;
use toukui::dashboard::Dashboard;
use toukui::geometry::Size;
use toukui::render::Draw;
use toukui::session::{SelectedFile, Session};

const OVERLAY_FILE_NAME: &str = "overlay.png";

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();
  info!("推理服务地址: {}", args.endpoint);

  let client = InferenceClient::new(args.client_config())?;

  match args.command {
    Command::Health => {
      let health = client.health().await?;
      println!("{}", serde_json::to_string_pretty(&health)?);
    }
    Command::Detect {
      image,
      display,
      output,
      font,
      no_export,
    } => {
      let draw = Draw::discover(font.as_deref());
      let mut dashboard = Dashboard::new(Session::default(), client, draw);
      detect(&mut dashboard, &image, display, &output, no_export).await?;
    }
  }

  Ok(())
}

async fn detect(
  dashboard: &mut Dashboard,
  image: &Path,
  display: Option<Size>,
  output: &Path,
  no_export: bool,
) -> Result<()> {
  dashboard.select_file(Some(SelectedFile::open(image)?));
  dashboard.detect().await?;

  let session = dashboard.session();
  let summary = session.summary();
  println!(
    "检测到 {} 个对象（可绘制 {}）: 安全帽 {}, 人员 {}, 其他 {}",
    summary.total, summary.drawable, summary.helmets, summary.persons, summary.others
  );
  for det in session.detections() {
    match det.drawable_bbox() {
      Some([x1, y1, x2, y2]) => println!(
        "  - {} at ({:.0}, {:.0}, {:.0}x{:.0})",
        det.label(),
        x1,
        y1,
        x2 - x1,
        y2 - y1
      ),
      None => println!("  - {} (无检测框)", det.label()),
    }
  }
  if let Some(prediction) = dashboard.last_prediction()
    && let Some(seconds) = prediction.inference_time
  {
    info!("服务端推理耗时: {:.3}s", seconds);
  }

  if let Some(size) = display {
    let overlay = dashboard.overlay(size)?;
    std::fs::create_dir_all(output)?;
    let path = output.join(OVERLAY_FILE_NAME);
    overlay.save(&path)?;
    info!("叠加层已保存: {}", path.display());
  }

  if no_export {
    return Ok(());
  }
  if dashboard.session().detections().is_empty() {
    warn!("没有检测结果，跳过导出");
    return Ok(());
  }
  let path = dashboard.export(output).await?;
  println!("标注图像: {}", path.display());

  Ok(())
}
