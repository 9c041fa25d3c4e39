// 该文件是 Toukui （头盔） 项目的一部分。
// src/session.rs - 会话状态控制
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

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::detection::{Detection, Summary};
use crate::geometry::Size;

mod preview;
pub use self::preview::{PreviewHandle, PreviewStore, SelectedFile};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
  #[error("请先选择图像文件")]
  NoFileSelected,
  #[error("已有推理请求正在进行")]
  InFlight,
}

/// 会话状态：`Idle → Ready → Loading → Done | Error`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Status {
  #[default]
  Idle,
  Ready,
  Loading,
  Done,
  Error,
}

/// 推理请求的凭证，结果返回时据此判断是否已过期
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
  seq: u64,
}

/// 一次已登记的推理请求
#[derive(Debug, Clone)]
pub struct InferenceRequest {
  pub ticket: RequestTicket,
  pub file: SelectedFile,
}

/// 结果是否被会话采纳
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Applied,
  Stale,
}

/// 会话状态控制器，独占当前文件及其预览句柄
#[derive(Debug)]
pub struct Session {
  previews: PreviewStore,
  file: Option<SelectedFile>,
  preview: Option<PreviewHandle>,
  detections: Arc<[Detection]>,
  status: Status,
  error: Option<String>,
  pending: Option<RequestTicket>,
  next_seq: u64,
}

impl Default for Session {
  fn default() -> Self {
    Self::new(PreviewStore::default())
  }
}

impl Session {
  pub fn new(previews: PreviewStore) -> Self {
    Self {
      previews,
      file: None,
      preview: None,
      detections: Vec::new().into(),
      status: Status::Idle,
      error: None,
      pending: None,
      next_seq: 0,
    }
  }

  /// 选择新文件（或传入 `None` 移除文件）。旧预览句柄先释放，已有结果清空。
  pub fn select_file(&mut self, file: Option<SelectedFile>) {
    let Some(file) = file else {
      self.clear();
      return;
    };

    self.release_preview();
    let handle = self.previews.create(file.bytes.clone());
    info!(
      "选择文件: {} ({} 字节, 尺寸 {})",
      file.name,
      file.bytes.len(),
      handle
        .natural_size()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "未知".to_string())
    );

    self.file = Some(file);
    self.preview = Some(handle);
    self.detections = Vec::new().into();
    self.status = Status::Ready;
    self.error = None;
    self.pending = None;
  }

  /// 释放预览句柄，恢复初始状态
  pub fn clear(&mut self) {
    self.release_preview();
    if self.pending.is_some() {
      debug!("会话清空，丢弃进行中的请求");
    }
    self.file = None;
    self.detections = Vec::new().into();
    self.status = Status::Idle;
    self.error = None;
    self.pending = None;
    info!("会话已清空");
  }

  /// 登记一次推理请求。未选择文件或已有请求在进行时拒绝，状态不变，只记录错误信息。
  pub fn start_inference(&mut self) -> Result<InferenceRequest, SessionError> {
    let Some(file) = self.file.clone() else {
      return Err(self.reject(SessionError::NoFileSelected));
    };
    if self.status == Status::Loading {
      return Err(self.reject(SessionError::InFlight));
    }

    self.next_seq += 1;
    let ticket = RequestTicket { seq: self.next_seq };
    self.pending = Some(ticket);
    self.status = Status::Loading;
    self.error = None;
    info!("开始推理: {} (请求 #{})", file.name, ticket.seq);

    Ok(InferenceRequest { ticket, file })
  }

  /// 整体替换检测结果。过期请求的结果被丢弃，不修改任何状态。
  pub fn receive_results(&mut self, ticket: RequestTicket, detections: Vec<Detection>) -> Outcome {
    if !self.accepts(ticket) {
      debug!("丢弃过期请求 #{} 的结果", ticket.seq);
      return Outcome::Stale;
    }

    info!("请求 #{} 完成: {} 个检测结果", ticket.seq, detections.len());
    self.detections = detections.into();
    self.status = Status::Done;
    self.error = None;
    self.pending = None;
    Outcome::Applied
  }

  /// 请求失败。过期请求的失败同样被丢弃。
  pub fn fail(&mut self, ticket: RequestTicket, message: impl Into<String>) -> Outcome {
    if !self.accepts(ticket) {
      debug!("丢弃过期请求 #{} 的错误", ticket.seq);
      return Outcome::Stale;
    }

    let message = message.into();
    warn!("请求 #{} 失败: {}", ticket.seq, message);
    self.status = Status::Error;
    self.error = Some(message);
    self.pending = None;
    Outcome::Applied
  }

  /// 记录用户操作产生的错误信息，不改变状态
  pub fn report(&mut self, message: impl Into<String>) {
    let message = message.into();
    warn!("{}", message);
    self.error = Some(message);
  }

  fn reject(&mut self, err: SessionError) -> SessionError {
    self.report(err.to_string());
    err
  }

  fn accepts(&self, ticket: RequestTicket) -> bool {
    self.status == Status::Loading && self.pending == Some(ticket)
  }

  fn release_preview(&mut self) {
    if let Some(handle) = self.preview.take() {
      self.previews.revoke(handle);
    }
  }

  pub fn status(&self) -> Status {
    self.status
  }

  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  pub fn file(&self) -> Option<&SelectedFile> {
    self.file.as_ref()
  }

  pub fn preview(&self) -> Option<&PreviewHandle> {
    self.preview.as_ref()
  }

  pub fn natural_size(&self) -> Option<Size> {
    self.preview.as_ref().and_then(PreviewHandle::natural_size)
  }

  pub fn detections(&self) -> &[Detection] {
    &self.detections
  }

  /// 共享的检测结果列表，供导出等后台任务使用
  pub fn shared_detections(&self) -> Arc<[Detection]> {
    self.detections.clone()
  }

  pub fn summary(&self) -> Summary {
    Summary::of(&self.detections)
  }

  pub fn previews(&self) -> &PreviewStore {
    &self.previews
  }
}

impl Drop for Session {
  fn drop(&mut self) {
    self.release_preview();
  }
}
