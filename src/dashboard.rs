// 该文件是 Toukui （头盔） 项目的一部分。
// src/dashboard.rs - 会话、推理客户端与渲染的组装
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
use std::sync::Arc;

use image::RgbaImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::client::{ClientError, InferenceClient};
use crate::detection::Prediction;
use crate::geometry::Size;
use crate::render::export::{encode_png, render_annotated, save_download};
use crate::render::{Draw, ExportError, RenderError, render_overlay};
use crate::session::{InferenceRequest, Outcome, RequestTicket, SelectedFile, Session, SessionError};

#[derive(Error, Debug)]
pub enum DashboardError {
  #[error("{0}")]
  Session(#[from] SessionError),
  #[error("{0}")]
  Client(#[from] ClientError),
  #[error("{0}")]
  Render(#[from] RenderError),
  #[error("{0}")]
  Export(#[from] ExportError),
  #[error("后台任务中断: {0}")]
  Interrupted(#[from] tokio::task::JoinError),
}

/// 已登记但尚未发出的推理请求，可脱离会话单独等待
pub struct PendingInference {
  request: InferenceRequest,
  client: InferenceClient,
}

impl PendingInference {
  pub fn ticket(&self) -> RequestTicket {
    self.request.ticket
  }

  pub async fn run(self) -> Completion {
    let result = self.client.predict(&self.request.file).await;
    Completion {
      ticket: self.request.ticket,
      result,
    }
  }
}

/// 推理请求的返回，需交回会话判断是否过期
pub struct Completion {
  ticket: RequestTicket,
  result: Result<Prediction, ClientError>,
}

/// 仪表盘宿主：用户操作入口。每个操作的错误都记录到会话中，不会终止程序。
pub struct Dashboard {
  session: Session,
  client: InferenceClient,
  draw: Arc<Draw>,
  last_prediction: Option<Prediction>,
}

impl Dashboard {
  pub fn new(session: Session, client: InferenceClient, draw: Draw) -> Self {
    Self {
      session,
      client,
      draw: Arc::new(draw),
      last_prediction: None,
    }
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  /// 最近一次被采纳的完整响应（含耗时、图像尺寸等附加字段）
  pub fn last_prediction(&self) -> Option<&Prediction> {
    self.last_prediction.as_ref()
  }

  pub fn select_file(&mut self, file: Option<SelectedFile>) {
    self.last_prediction = None;
    self.session.select_file(file);
  }

  pub fn clear(&mut self) {
    self.last_prediction = None;
    self.session.clear();
  }

  pub fn begin_inference(&mut self) -> Result<PendingInference, DashboardError> {
    let request = self.session.start_inference()?;
    Ok(PendingInference {
      request,
      client: self.client.clone(),
    })
  }

  /// 交回请求结果。过期结果直接丢弃，既不修改状态也不报告错误。
  pub fn complete(&mut self, completion: Completion) -> Result<Outcome, DashboardError> {
    let Completion { ticket, result } = completion;
    match result {
      Ok(prediction) => {
        let outcome = self
          .session
          .receive_results(ticket, prediction.detections.clone());
        if outcome == Outcome::Applied {
          self.last_prediction = Some(prediction);
        }
        Ok(outcome)
      }
      Err(err) => match self.session.fail(ticket, err.to_string()) {
        Outcome::Applied => Err(err.into()),
        Outcome::Stale => Ok(Outcome::Stale),
      },
    }
  }

  /// 发起推理并等待结果
  pub async fn detect(&mut self) -> Result<Outcome, DashboardError> {
    let pending = self.begin_inference()?;
    let completion = pending.run().await;
    self.complete(completion)
  }

  /// 按当前显示尺寸渲染叠加层
  pub fn overlay(&mut self, displayed: Size) -> Result<RgbaImage, DashboardError> {
    let result = render_overlay(
      self.session.detections(),
      self.session.natural_size(),
      displayed,
      &self.draw,
    );
    self.surface(result)
  }

  /// 在原始分辨率上导出标注图像，写入 `directory/annotated.png`
  pub async fn export(&mut self, directory: &Path) -> Result<PathBuf, DashboardError> {
    let source = self.session.file().map(|f| f.bytes.clone());
    let detections = self.session.shared_detections();
    let draw = self.draw.clone();

    debug!("等待图像解码与绘制...");
    let encoded = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ExportError> {
      let image = render_annotated(source.as_deref(), &detections, &draw)?;
      encode_png(&image)
    })
    .await;

    let png = match encoded {
      Ok(result) => self.surface(result)?,
      Err(join) => return self.surface(Err::<PathBuf, _>(join)),
    };
    let path = self.surface(save_download(directory, &png))?;
    info!("导出完成: {}", path.display());
    Ok(path)
  }

  fn surface<T, E: Into<DashboardError>>(&mut self, result: Result<T, E>) -> Result<T, DashboardError> {
    result.map_err(|e| {
      let err: DashboardError = e.into();
      self.session.report(err.to_string());
      err
    })
  }
}
