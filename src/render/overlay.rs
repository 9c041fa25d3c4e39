// 该文件是 Toukui （头盔） 项目的一部分。
// src/render/overlay.rs - 显示尺寸的检测叠加层
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
use tracing::debug;

use crate::detection::{Category, Detection};
use crate::geometry::{Rect, Scale, Size};
use crate::render::draw::{font_px_for, label_padding_for, line_width_for};
use crate::render::{Draw, RenderError, allocate_surface};

/// 一个待绘制的检测标注，坐标均为目标绘制面的像素
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
  /// 在检测列表中的下标
  pub index: usize,
  pub category: Category,
  pub color: [u8; 3],
  pub bbox: Rect,
  pub label: String,
  pub chip: Rect,
}

/// 一次完整绘制所需的全部几何信息
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayScene {
  pub surface: Size,
  pub line_width: f32,
  pub font_px: f32,
  pub annotations: Vec<Annotation>,
}

impl OverlayScene {
  /// 纯函数：由检测列表、缩放因子和绘制面尺寸计算场景。
  /// 不可绘制的记录被跳过，顺序与检测列表一致。
  pub fn layout(detections: &[Detection], scale: Scale, surface: Size, draw: &Draw) -> Self {
    let line_width = line_width_for(surface.width);
    let font_px = font_px_for(surface.width);
    let padding = label_padding_for(font_px);

    let annotations = detections
      .iter()
      .enumerate()
      .filter_map(|(index, det)| {
        let bbox = scale.map_bbox(&det.drawable_bbox()?);
        let category = det.category();
        let label = det.label();
        let (text_width, text_height) = draw.measure(&label, font_px);
        let chip = Rect::new(
          bbox.x,
          (bbox.y - text_height).max(0.0),
          text_width + 2.0 * padding,
          text_height,
        );
        Some(Annotation {
          index,
          category,
          color: category.color(),
          bbox,
          label,
          chip,
        })
      })
      .collect();

    Self {
      surface,
      line_width,
      font_px,
      annotations,
    }
  }
}

/// 按当前显示尺寸渲染叠加层（透明背景）。
///
/// 每次调用都从空白绘制面重新绘制，相同输入得到相同结果。
pub fn render_overlay(
  detections: &[Detection],
  natural: Option<Size>,
  displayed: Size,
  draw: &Draw,
) -> Result<RgbaImage, RenderError> {
  let mut surface = allocate_surface(displayed)?;
  let scale = Scale::between(natural, displayed);
  let scene = OverlayScene::layout(detections, scale, displayed, draw);
  debug!(
    "叠加层: 显示尺寸 {}, 缩放 ({:.3}, {:.3}), {} 个标注",
    displayed,
    scale.sx,
    scale.sy,
    scene.annotations.len()
  );
  draw.paint(&mut surface, &scene);
  Ok(surface)
}
