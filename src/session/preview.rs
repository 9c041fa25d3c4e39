// 该文件是 Toukui （头盔） 项目的一部分。
// src/session/preview.rs - 预览句柄
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

use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use image::ImageReader;
use tracing::{debug, warn};

use crate::geometry::Size;

/// 用户选择的图像文件
#[derive(Debug, Clone)]
pub struct SelectedFile {
  pub name: String,
  pub bytes: Arc<[u8]>,
}

impl SelectedFile {
  pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
    Self {
      name: name.into(),
      bytes: bytes.into(),
    }
  }

  pub fn open(path: &Path) -> Result<Self, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "image".to_string());
    Ok(Self::new(name, bytes))
  }

  /// 按扩展名推断 MIME 类型
  pub fn mime(&self) -> &'static str {
    let lower = self.name.to_lowercase();
    match lower.rsplit_once('.').map(|(_, ext)| ext) {
      Some("jpg") | Some("jpeg") => "image/jpeg",
      Some("png") => "image/png",
      Some("bmp") => "image/bmp",
      Some("gif") => "image/gif",
      Some("webp") => "image/webp",
      _ => "application/octet-stream",
    }
  }
}

/// 指向预览字节的可撤销引用。不可克隆，撤销时被消耗。
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
  id: u64,
  natural_size: Option<Size>,
}

impl PreviewHandle {
  pub fn id(&self) -> u64 {
    self.id
  }

  /// 图像头中读取到的原始尺寸，无法识别时为 `None`
  pub fn natural_size(&self) -> Option<Size> {
    self.natural_size
  }

  pub fn url(&self) -> String {
    format!("blob:toukui/{}", self.id)
  }
}

#[derive(Debug, Default)]
struct PreviewTable {
  next_id: u64,
  live: HashMap<u64, Arc<[u8]>>,
}

/// 持有预览字节的存储，可在会话与宿主之间共享
#[derive(Debug, Clone, Default)]
pub struct PreviewStore {
  table: Arc<Mutex<PreviewTable>>,
}

impl PreviewStore {
  fn table(&self) -> MutexGuard<'_, PreviewTable> {
    self.table.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn create(&self, bytes: Arc<[u8]>) -> PreviewHandle {
    let natural_size = probe_size(&bytes);
    if natural_size.is_none() {
      warn!("无法读取图像尺寸，按未知尺寸处理");
    }

    let mut table = self.table();
    table.next_id += 1;
    let id = table.next_id;
    table.live.insert(id, bytes);
    debug!("创建预览句柄 {}", id);

    PreviewHandle { id, natural_size }
  }

  pub fn revoke(&self, handle: PreviewHandle) {
    if self.table().live.remove(&handle.id).is_some() {
      debug!("释放预览句柄 {}", handle.id);
    }
  }

  pub fn resolve(&self, handle: &PreviewHandle) -> Option<Arc<[u8]>> {
    self.table().live.get(&handle.id).cloned()
  }

  pub fn live_count(&self) -> usize {
    self.table().live.len()
  }
}

fn probe_size(bytes: &[u8]) -> Option<Size> {
  ImageReader::new(Cursor::new(bytes))
    .with_guessed_format()
    .ok()?
    .into_dimensions()
    .ok()
    .map(Size::from)
}
