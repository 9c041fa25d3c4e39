// 该文件是 Toukui （头盔） 项目的一部分。
// src/client.rs - 推理服务客户端
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

use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::FromUrl;
use crate::detection::{Health, Prediction};
use crate::session::SelectedFile;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/";
const PREDICT_PATH: &str = "predict";
const HEALTH_PATH: &str = "health";
const UPLOAD_FIELD: &str = "file";

#[derive(Error, Debug)]
pub enum ClientError {
  #[error("服务器错误 ({status}): {body}")]
  ServerError { status: u16, body: String },
  #[error("网络错误: {0}")]
  NetworkError(#[source] reqwest::Error),
  #[error("响应解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("推理服务地址无效: {0}")]
  InvalidEndpoint(String),
}

impl From<reqwest::Error> for ClientError {
  fn from(err: reqwest::Error) -> Self {
    ClientError::NetworkError(err)
  }
}

/// 客户端配置，由宿主显式传入
#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub endpoint: Url,
  pub timeout: Option<Duration>,
  pub conf_threshold: Option<f32>,
  pub iou_threshold: Option<f32>,
}

impl ClientConfig {
  pub fn new(endpoint: Url) -> Self {
    Self {
      endpoint,
      timeout: None,
      conf_threshold: None,
      iou_threshold: None,
    }
  }

  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn conf_threshold(mut self, threshold: f32) -> Self {
    self.conf_threshold = Some(threshold);
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = Some(threshold);
    self
  }
}

#[derive(Debug, Clone)]
pub struct InferenceClient {
  base: Url,
  http: reqwest::Client,
  config: ClientConfig,
}

impl FromUrl for InferenceClient {
  type Error = ClientError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    InferenceClient::new(ClientConfig::new(url.clone()))
  }
}

impl InferenceClient {
  pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
    let mut base = config.endpoint.clone();
    if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
      return Err(ClientError::InvalidEndpoint(base.to_string()));
    }
    // 以 `/` 结尾，保证 join 时保留已有路径前缀
    if !base.path().ends_with('/') {
      let path = format!("{}/", base.path());
      base.set_path(&path);
    }

    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.timeout {
      builder = builder.timeout(timeout);
    }
    let http = builder.build()?;

    info!("推理服务地址: {}", base);
    Ok(Self { base, http, config })
  }

  pub fn base(&self) -> &Url {
    &self.base
  }

  fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
    self
      .base
      .join(path)
      .map_err(|e| ClientError::InvalidEndpoint(format!("{}{}: {}", self.base, path, e)))
  }

  /// 以 multipart 表单上传图像，解析 `/predict` 响应
  pub async fn predict(&self, file: &SelectedFile) -> Result<Prediction, ClientError> {
    let url = self.endpoint(PREDICT_PATH)?;

    let mut query = Vec::new();
    if let Some(conf) = self.config.conf_threshold {
      query.push(("conf_threshold", conf.to_string()));
    }
    if let Some(iou) = self.config.iou_threshold {
      query.push(("iou_threshold", iou.to_string()));
    }

    let part = Part::bytes(file.bytes.to_vec())
      .file_name(file.name.clone())
      .mime_str(file.mime())?;
    let form = Form::new().part(UPLOAD_FIELD, part);

    info!("上传 {} ({} 字节) 到 {}", file.name, file.bytes.len(), url);
    let now = Instant::now();
    let response = self
      .http
      .post(url)
      .query(&query)
      .multipart(form)
      .send()
      .await
      .inspect_err(|e| error!("推理请求失败: {}", e))?;

    let body = read_body(response).await?;
    let prediction = Prediction::from_json(&body)?;
    info!(
      "推理完成，耗时: {:.2?}，{} 个检测结果",
      now.elapsed(),
      prediction.detections.len()
    );
    if let Some(message) = &prediction.message {
      debug!("服务端消息: {}", message);
    }
    Ok(prediction)
  }

  /// 查询 `/health`
  pub async fn health(&self) -> Result<Health, ClientError> {
    let url = self.endpoint(HEALTH_PATH)?;
    debug!("健康检查: {}", url);
    let response = self.http.get(url).send().await?;
    let body = read_body(response).await?;
    Ok(serde_json::from_str(&body)?)
  }
}

async fn read_body(response: reqwest::Response) -> Result<String, ClientError> {
  let status = response.status();
  if !status.is_success() {
    let body = match response.text().await {
      Ok(body) => body,
      Err(e) => {
        error!("读取错误响应体失败: {}", e);
        String::new()
      }
    };
    error!("服务器返回 {}: {}", status, body);
    return Err(ClientError::ServerError {
      status: status.as_u16(),
      body,
    });
  }
  Ok(response.text().await?)
}
