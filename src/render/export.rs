// 该文件是 Toukui （头盔） 项目的一部分。
// src/render/export.rs - 原始分辨率的标注图像导出
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

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};
use thiserror::Error;
use tracing::{info, warn};

use crate::detection::Detection;
use crate::geometry::{Scale, Size};
use crate::render::{Draw, OverlayScene, RenderError, allocate_surface};

pub const DOWNLOAD_FILE_NAME: &str = "annotated.png";

#[derive(Error, Debug)]
pub enum ExportError {
  #[error("没有可导出的内容: {0}")]
  Empty(&'static str),
  #[error("图像解码错误: {0}")]
  ImageLoad(#[source] image::ImageError),
  #[error("绘制面错误: {0}")]
  Surface(#[from] RenderError),
  #[error("PNG 编码错误: {0}")]
  Encode(#[source] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 在原始分辨率上重新绘制图像和全部可绘制的检测结果，不做缩放。
///
/// 图像必须先完整解码才会开始绘制。
pub fn render_annotated(
  source: Option<&[u8]>,
  detections: &[Detection],
  draw: &Draw,
) -> Result<RgbaImage, ExportError> {
  let bytes = source.ok_or(ExportError::Empty("未选择图像"))?;
  if detections.is_empty() {
    return Err(ExportError::Empty("没有检测结果"));
  }

  let decoded = image::load_from_memory(bytes).map_err(ExportError::ImageLoad)?;
  let natural = Size::new(decoded.width(), decoded.height());

  let mut surface = allocate_surface(natural)?;
  let scene = OverlayScene::layout(detections, Scale::IDENTITY, natural, draw);
  draw.paint(&mut surface, &scene);

  // 标注层叠加到原图上
  let mut base = decoded.to_rgba8();
  image::imageops::overlay(&mut base, &surface, 0, 0);

  info!(
    "导出标注图像: {}, {} 个标注",
    natural,
    scene.annotations.len()
  );
  Ok(base)
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ExportError> {
  let mut buffer = Cursor::new(Vec::new());
  image
    .write_to(&mut buffer, ImageFormat::Png)
    .map_err(ExportError::Encode)?;
  Ok(buffer.into_inner())
}

/// 将 PNG 字节写入下载目录，文件名固定为 `annotated.png`
pub fn save_download(directory: &Path, png: &[u8]) -> Result<PathBuf, ExportError> {
  if !directory.as_os_str().is_empty() {
    std::fs::create_dir_all(directory)?;
  }
  let path = directory.join(DOWNLOAD_FILE_NAME);
  std::fs::write(&path, png)?;
  warn!("保存标注图像到文件: {}", path.display());
  Ok(path)
}
