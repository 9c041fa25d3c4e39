// 该文件是 Toukui （头盔） 项目的一部分。
// src/render.rs - 检测结果渲染
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

use image::RgbaImage;
use thiserror::Error;

use crate::geometry::Size;

pub mod draw;
pub mod export;
pub mod overlay;

pub use self::draw::Draw;
pub use self::export::{DOWNLOAD_FILE_NAME, ExportError};
pub use self::overlay::{Annotation, OverlayScene, render_overlay};

// 单边像素上限，超过视为无法创建绘制面
const MAX_SURFACE_SIDE: u32 = 16384;

#[derive(Error, Debug)]
pub enum RenderError {
  #[error("无法创建绘制面: {0}")]
  SurfaceCreation(Size),
  #[error("字体加载错误: {0}")]
  FontLoad(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 分配一块全透明的绘制面
pub fn allocate_surface(size: Size) -> Result<RgbaImage, RenderError> {
  if size.is_empty() || size.width > MAX_SURFACE_SIDE || size.height > MAX_SURFACE_SIDE {
    return Err(RenderError::SurfaceCreation(size));
  }
  Ok(RgbaImage::new(size.width, size.height))
}
