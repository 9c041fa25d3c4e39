// 该文件是 Toukui （头盔） 项目的一部分。
// src/geometry.rs - 原始分辨率与显示分辨率之间的坐标映射
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

/// 像素尺寸（宽, 高）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Size {
  pub width: u32,
  pub height: u32,
}

impl Size {
  pub const fn new(width: u32, height: u32) -> Self {
    Self { width, height }
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }
}

impl From<(u32, u32)> for Size {
  fn from((width, height): (u32, u32)) -> Self {
    Self { width, height }
  }
}

impl std::fmt::Display for Size {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}x{}", self.width, self.height)
  }
}

/// 左上角 + 宽高形式的矩形，单位为目标绘制面的像素
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
  pub x: f32,
  pub y: f32,
  pub width: f32,
  pub height: f32,
}

impl Rect {
  pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }
}

/// 原始坐标到目标坐标的缩放因子
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
  pub sx: f32,
  pub sy: f32,
}

impl Scale {
  /// 导出时目标绘制面即为原始分辨率，不做缩放
  pub const IDENTITY: Scale = Scale { sx: 1.0, sy: 1.0 };

  /// 由原始尺寸和显示尺寸计算缩放因子。
  ///
  /// 原始尺寸未知或为零时按 1 处理，避免除零。
  pub fn between(natural: Option<Size>, displayed: Size) -> Self {
    let (nw, nh) = natural
      .map(|s| (s.width.max(1), s.height.max(1)))
      .unwrap_or((1, 1));
    Self {
      sx: displayed.width as f32 / nw as f32,
      sy: displayed.height as f32 / nh as f32,
    }
  }

  /// 将 `[x1, y1, x2, y2]` 形式的原始坐标框映射为显示坐标下的左上角 + 宽高
  pub fn map_bbox(&self, bbox: &[f32; 4]) -> Rect {
    let [x1, y1, x2, y2] = *bbox;
    Rect {
      x: x1 * self.sx,
      y: y1 * self.sy,
      width: (x2 - x1) * self.sx,
      height: (y2 - y1) * self.sy,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn halves_box_when_displayed_at_half_size() {
    let scale = Scale::between(Some(Size::new(800, 600)), Size::new(400, 300));
    let rect = scale.map_bbox(&[100.0, 50.0, 300.0, 250.0]);
    assert_eq!(rect, Rect::new(50.0, 25.0, 100.0, 100.0));
  }

  #[test]
  fn scales_axes_independently() {
    let scale = Scale::between(Some(Size::new(1000, 500)), Size::new(500, 500));
    let rect = scale.map_bbox(&[10.0, 10.0, 110.0, 60.0]);
    assert_eq!(rect, Rect::new(5.0, 10.0, 50.0, 50.0));
  }

  #[test]
  fn unknown_natural_size_falls_back_to_one() {
    let scale = Scale::between(None, Size::new(640, 480));
    assert_eq!(scale, Scale { sx: 640.0, sy: 480.0 });

    let scale = Scale::between(Some(Size::new(0, 0)), Size::new(10, 20));
    assert_eq!(scale, Scale { sx: 10.0, sy: 20.0 });
  }

  #[test]
  fn identity_keeps_natural_coordinates() {
    let rect = Scale::IDENTITY.map_bbox(&[100.0, 50.0, 300.0, 250.0]);
    assert_eq!(rect, Rect::new(100.0, 50.0, 200.0, 200.0));
  }
}
