// 该文件是 Toukui （头盔） 项目的一部分。
// src/render/draw.rs - 检测框与标签的光栅化
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

use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use tracing::{debug, info, warn};

use crate::geometry::Rect;
use crate::render::{OverlayScene, RenderError};

// 未加载字体时按字号估算字符宽度（粗略估计）
const LABEL_CHAR_WIDTH_RATIO: f32 = 0.55;
const LABEL_TEXT_COLOR: [u8; 4] = [255, 255, 255, 255]; // 白色文本

// 常见系统字体位置
const SYSTEM_FONTS: [&str; 4] = [
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
];

/// 线宽随绘制面宽度缩放：`max(2, width / 300)`
pub fn line_width_for(surface_width: u32) -> f32 {
  (surface_width as f32 / 300.0).max(2.0)
}

/// 字号随绘制面宽度缩放：`max(12, width / 40)`
pub fn font_px_for(surface_width: u32) -> f32 {
  (surface_width as f32 / 40.0).max(12.0)
}

/// 标签底块高度，即标签上移的距离
pub fn label_height_for(font_px: f32) -> f32 {
  (font_px * 1.25).ceil()
}

/// 标签文字与底块边缘的间距
pub fn label_padding_for(font_px: f32) -> f32 {
  (font_px * 0.25).ceil()
}

/// 绘制器，持有可选的字体。没有字体时仍绘制边框和标签底块，只跳过文字。
#[derive(Default)]
pub struct Draw {
  font: Option<FontVec>,
}

impl Draw {
  pub fn with_font(font: FontVec) -> Self {
    Self { font: Some(font) }
  }

  /// 从指定路径加载 TrueType/OpenType 字体
  pub fn load(path: &Path) -> Result<Self, RenderError> {
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)
      .map_err(|e| RenderError::FontLoad(format!("{}: {}", path.display(), e)))?;
    info!("加载字体: {}", path.display());
    Ok(Self::with_font(font))
  }

  /// 优先使用指定字体，否则在常见系统位置查找
  pub fn discover(preferred: Option<&Path>) -> Self {
    let candidates = preferred
      .map(Path::to_path_buf)
      .into_iter()
      .chain(SYSTEM_FONTS.into_iter().map(PathBuf::from));

    for path in candidates {
      if !path.is_file() {
        continue;
      }
      match Self::load(&path) {
        Ok(draw) => return draw,
        Err(e) => warn!("字体不可用: {}", e),
      }
    }

    warn!("未找到可用字体，标签将只绘制底块");
    Self::default()
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 文本宽高（像素）。高度固定为标签底块高度，宽度优先使用字体度量。
  pub fn measure(&self, text: &str, font_px: f32) -> (f32, f32) {
    let width = match &self.font {
      Some(font) => text_size(PxScale::from(font_px), font, text).0 as f32,
      None => text.chars().count() as f32 * font_px * LABEL_CHAR_WIDTH_RATIO,
    };
    (width, label_height_for(font_px))
  }

  /// 清空绘制面后按场景重新绘制全部标注
  pub fn paint(&self, surface: &mut RgbaImage, scene: &OverlayScene) {
    surface.pixels_mut().for_each(|p| *p = Rgba([0, 0, 0, 0]));

    let line = scene.line_width.round().max(1.0) as i32;
    let padding = label_padding_for(scene.font_px);

    for annotation in scene.annotations.iter() {
      let [r, g, b] = annotation.color;
      let color = Rgba([r, g, b, 255]);

      stroke_rect(surface, &annotation.bbox, line, color);

      let chip = &annotation.chip;
      // 底块完全落在绘制面外时连同文字一起跳过
      let Some(rect) = to_pixel_rect(chip, surface) else {
        continue;
      };
      draw_filled_rect_mut(surface, rect, color);

      if let Some(font) = &self.font {
        let text_y = chip.y + (chip.height - scene.font_px) / 2.0;
        draw_text_mut(
          surface,
          Rgba(LABEL_TEXT_COLOR),
          (chip.x + padding).round() as i32,
          text_y.round() as i32,
          PxScale::from(scene.font_px),
          font,
          &annotation.label,
        );
      }
    }

    debug!(
      "绘制 {} 个标注到 {}x{} 绘制面",
      scene.annotations.len(),
      surface.width(),
      surface.height()
    );
  }
}

// 先在浮点坐标下裁剪到绘制面 [0, w] x [0, h]，再转换为整数像素矩形；
// 裁剪后为空时返回 None
fn to_pixel_rect(rect: &Rect, surface: &RgbaImage) -> Option<imageproc::rect::Rect> {
  let (w, h) = (surface.width() as f32, surface.height() as f32);
  let (left, top) = (rect.x.round(), rect.y.round());
  let right = (left + rect.width.round()).clamp(0.0, w);
  let bottom = (top + rect.height.round()).clamp(0.0, h);
  let (left, top) = (left.clamp(0.0, w), top.clamp(0.0, h));

  // NaN 也在这里被排除
  if !(right > left && bottom > top) {
    return None;
  }
  Some(
    imageproc::rect::Rect::at(left as i32, top as i32)
      .of_size((right - left) as u32, (bottom - top) as u32),
  )
}

// 边框向内加粗
fn stroke_rect(surface: &mut RgbaImage, rect: &Rect, line: i32, color: Rgba<u8>) {
  let Some(outer) = to_pixel_rect(rect, surface) else {
    return;
  };
  let (x, y) = (outer.left(), outer.top());
  let (width, height) = (outer.width() as i32, outer.height() as i32);

  for t in 0..line {
    let (w, h) = (width - 2 * t, height - 2 * t);
    if w <= 0 || h <= 0 {
      break;
    }
    let inner = imageproc::rect::Rect::at(x + t, y + t).of_size(w as u32, h as u32);
    draw_hollow_rect_mut(surface, inner, color);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::Detection;
  use crate::geometry::{Scale, Size};

  // `TOUKUI_FONT` 优先，其次是常见系统字体
  fn available_font() -> Option<Draw> {
    std::env::var_os("TOUKUI_FONT")
      .map(PathBuf::from)
      .into_iter()
      .chain(SYSTEM_FONTS.into_iter().map(PathBuf::from))
      .find(|path| path.is_file())
      .and_then(|path| Draw::load(&path).ok())
  }

  #[test]
  fn sizing_scales_with_surface_width() {
    assert_eq!(line_width_for(400), 2.0);
    assert_eq!(line_width_for(1200), 4.0);
    assert_eq!(font_px_for(400), 12.0);
    assert_eq!(font_px_for(800), 20.0);
  }

  #[test]
  fn estimates_text_without_font() {
    let draw = Draw::default();
    assert!(!draw.has_font());
    let (w, h) = draw.measure("helmet 92%", 20.0);
    assert_eq!(w, 10.0 * 20.0 * LABEL_CHAR_WIDTH_RATIO);
    assert_eq!(h, 25.0);
  }

  #[test]
  fn missing_font_file_is_an_error() {
    let result = Draw::load(Path::new("/nonexistent/toukui-font.ttf"));
    assert!(matches!(result, Err(RenderError::IoError(_))));
  }

  #[test]
  fn stroke_stays_inside_rect() {
    let mut surface = RgbaImage::new(20, 20);
    let green = Rgba([0, 200, 0, 255]);
    stroke_rect(&mut surface, &Rect::new(5.0, 5.0, 10.0, 10.0), 2, green);
    assert_eq!(*surface.get_pixel(5, 5), green);
    assert_eq!(*surface.get_pixel(6, 6), green);
    assert_eq!(*surface.get_pixel(14, 14), green);
    assert_eq!(surface.get_pixel(7, 7).0[3], 0);
    assert_eq!(surface.get_pixel(4, 4).0[3], 0);
    assert_eq!(surface.get_pixel(15, 15).0[3], 0);
  }

  #[test]
  fn stroke_is_clipped_to_surface() {
    let mut surface = RgbaImage::new(20, 20);
    let green = Rgba([0, 200, 0, 255]);
    stroke_rect(&mut surface, &Rect::new(10.0, 5.0, 3.0e9, 10.0), 2, green);
    // 右边缘落在绘制面最后一列
    assert_eq!(*surface.get_pixel(10, 5), green);
    assert_eq!(*surface.get_pixel(19, 10), green);
    assert_eq!(surface.get_pixel(15, 10).0[3], 0);

    let mut untouched = RgbaImage::new(20, 20);
    stroke_rect(&mut untouched, &Rect::new(3.0e9, 5.0, 1.0e9, 10.0), 2, green);
    stroke_rect(&mut untouched, &Rect::new(-4.0e9, -4.0e9, 1.0e9, 1.0e9), 2, green);
    stroke_rect(&mut untouched, &Rect::new(f32::NAN, 0.0, 5.0, 5.0), 2, green);
    assert!(untouched.pixels().all(|p| p.0[3] == 0));
  }

  #[test]
  fn pixel_rect_keeps_in_bounds_geometry() {
    let surface = RgbaImage::new(100, 100);
    let rect = to_pixel_rect(&Rect::new(10.4, 20.6, 30.0, 15.2), &surface).unwrap();
    assert_eq!((rect.left(), rect.top(), rect.width(), rect.height()), (10, 21, 30, 15));

    let clipped = to_pixel_rect(&Rect::new(-5.0, 90.0, 20.0, 20.0), &surface).unwrap();
    assert_eq!((clipped.left(), clipped.top(), clipped.width(), clipped.height()), (0, 90, 15, 10));

    assert!(to_pixel_rect(&Rect::new(100.0, 0.0, 10.0, 10.0), &surface).is_none());
  }

  #[test]
  fn paints_white_label_text_with_font() {
    let Some(draw) = available_font() else {
      eprintln!("未找到可用字体，跳过文字绘制测试");
      return;
    };
    assert!(draw.has_font());

    let size = Size::new(1600, 1200);
    let det = Detection::new("helmet", 0.92, [200.0, 200.0, 1000.0, 800.0]);
    let scene = OverlayScene::layout(&[det], Scale::IDENTITY, size, &draw);
    assert_eq!(scene.font_px, 40.0);

    let (text_width, text_height) = draw.measure("helmet 92%", scene.font_px);
    assert!(text_width > 0.0);
    assert_ne!(text_width, 10.0 * scene.font_px * LABEL_CHAR_WIDTH_RATIO);
    let chip = scene.annotations[0].chip;
    assert_eq!(chip.width, text_width + 2.0 * label_padding_for(scene.font_px));
    assert_eq!(chip.height, text_height);
    assert_eq!((chip.x, chip.y), (200.0, 150.0));

    let mut surface = RgbaImage::new(size.width, size.height);
    draw.paint(&mut surface, &scene);

    let chip_rect = to_pixel_rect(&chip, &surface).unwrap();
    let mut white = 0;
    for y in chip_rect.top()..=chip_rect.bottom() {
      for x in chip_rect.left()..=chip_rect.right() {
        let [r, g, b, a] = surface.get_pixel(x as u32, y as u32).0;
        if r >= 250 && g >= 250 && b >= 250 && a == 255 {
          white += 1;
        }
      }
    }
    assert!(white > 0, "标签底块内没有白色文字像素");
    // 底块左上角是底色
    assert_eq!(surface.get_pixel(200, 150).0, [0, 200, 0, 255]);
    // 文字不会画到底块之外的框内区域
    assert_eq!(surface.get_pixel(600, 500).0[3], 0);
  }
}
