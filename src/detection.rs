// 该文件是 Toukui （头盔） 项目的一部分。
// src/detection.rs - 检测记录模型
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

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const UNKNOWN_CLASS: &str = "unknown";
const CLASS_KEYS: [&str; 3] = ["class_name", "class", "label"];
const CONFIDENCE_KEYS: [&str; 2] = ["confidence", "conf"];

/// 单个检测目标，由推理服务返回的数据规范化而来，生成后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  pub class_name: String,
  pub confidence: f32,
  /// 原始分辨率下的 `[x1, y1, x2, y2]`，缺失时为 `None`
  pub bbox: Option<Vec<f32>>,
}

impl Detection {
  pub fn new(class_name: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
    Self {
      class_name: class_name.into(),
      confidence,
      bbox: Some(bbox.to_vec()),
    }
  }

  /// 兼容 `class_name`/`class`/`label` 与 `confidence`/`conf` 等字段变体
  pub fn from_value(value: &Value) -> Self {
    let class_name = CLASS_KEYS
      .iter()
      .find_map(|key| value.get(key).and_then(coerce_label))
      .unwrap_or_else(|| UNKNOWN_CLASS.to_string());

    let confidence = CONFIDENCE_KEYS
      .iter()
      .find_map(|key| value.get(key).and_then(coerce_number))
      .map(|c| c.clamp(0.0, 1.0))
      .unwrap_or(0.0);

    let bbox = value
      .get("bbox")
      .and_then(Value::as_array)
      .and_then(|items| items.iter().map(coerce_number).collect::<Option<Vec<_>>>());

    Self {
      class_name,
      confidence,
      bbox,
    }
  }

  /// 可绘制的框；缺失或不足 4 个元素时返回 `None`
  pub fn drawable_bbox(&self) -> Option<[f32; 4]> {
    match self.bbox.as_deref() {
      Some([x1, y1, x2, y2, ..]) => Some([*x1, *y1, *x2, *y2]),
      _ => None,
    }
  }

  pub fn category(&self) -> Category {
    Category::classify(&self.class_name)
  }

  /// 标签文本，例如 `helmet 92%`
  pub fn label(&self) -> String {
    format!(
      "{} {}%",
      self.class_name,
      (self.confidence * 100.0).round() as i32
    )
  }
}

fn coerce_label(value: &Value) -> Option<String> {
  match value {
    Value::String(s) => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    Value::Bool(b) => Some(b.to_string()),
    _ => None,
  }
}

fn coerce_number(value: &Value) -> Option<f32> {
  let number = match value {
    Value::Number(n) => n.as_f64()? as f32,
    Value::String(s) => s.trim().parse::<f32>().ok()?,
    Value::Bool(b) => *b as u8 as f32,
    _ => return None,
  };
  number.is_finite().then_some(number)
}

/// 按标签推断的类别。子串匹配，不区分大小写，先匹配 helmet 再匹配 person。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
  Helmet,
  Person,
  Other,
}

impl Category {
  pub fn classify(class_name: &str) -> Self {
    let lower = class_name.to_lowercase();
    if lower.contains("helmet") {
      Category::Helmet
    } else if lower.contains("person") {
      Category::Person
    } else {
      Category::Other
    }
  }

  pub fn color(&self) -> [u8; 3] {
    match self {
      Category::Helmet => [0, 200, 0],
      Category::Person => [0, 102, 255],
      Category::Other => [255, 140, 0],
    }
  }
}

/// 结果统计，不可绘制的记录同样计入
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
  pub total: usize,
  pub drawable: usize,
  pub helmets: usize,
  pub persons: usize,
  pub others: usize,
}

impl Summary {
  pub fn of(detections: &[Detection]) -> Self {
    detections.iter().fold(Summary::default(), |mut s, det| {
      s.total += 1;
      if det.drawable_bbox().is_some() {
        s.drawable += 1;
      }
      match det.category() {
        Category::Helmet => s.helmets += 1,
        Category::Person => s.persons += 1,
        Category::Other => s.others += 1,
      }
      s
    })
  }
}

/// `/predict` 的响应
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Prediction {
  pub success: Option<bool>,
  pub detections: Vec<Detection>,
  pub image_size: Option<[u32; 2]>,
  pub inference_time: Option<f64>,
  pub message: Option<String>,
}

impl Prediction {
  /// 解析响应体。只有非法 JSON 才会报错，缺失的 `detections` 视为空列表。
  pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
    let value: Value = serde_json::from_str(body)?;

    let detections = value
      .get("detections")
      .and_then(Value::as_array)
      .map(|items| items.iter().map(Detection::from_value).collect())
      .unwrap_or_default();

    let image_size = value.get("image_size").and_then(|v| {
      let pair = v.as_array()?;
      match pair.as_slice() {
        [w, h] => Some([
          u32::try_from(w.as_u64()?).ok()?,
          u32::try_from(h.as_u64()?).ok()?,
        ]),
        _ => None,
      }
    });

    Ok(Prediction {
      success: value.get("success").and_then(Value::as_bool),
      detections,
      image_size,
      inference_time: value.get("inference_time").and_then(Value::as_f64),
      message: value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string),
    })
  }
}

/// `/health` 的响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Health {
  pub status: String,
  pub model_loaded: bool,
  #[serde(default)]
  pub model_path: Option<String>,
  #[serde(default)]
  pub model_info: Map<String, Value>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn normalizes_field_variants() {
    let det = Detection::from_value(&json!({"class": "person", "conf": "0.5", "bbox": [1, 2, 3, 4]}));
    assert_eq!(det.class_name, "person");
    assert_eq!(det.confidence, 0.5);
    assert_eq!(det.drawable_bbox(), Some([1.0, 2.0, 3.0, 4.0]));

    let det = Detection::from_value(&json!({"label": "vest", "confidence": 0.25}));
    assert_eq!(det.class_name, "vest");
    assert_eq!(det.bbox, None);
  }

  #[test]
  fn defaults_missing_or_null_fields() {
    let det = Detection::from_value(&json!({"class_name": null, "confidence": "high"}));
    assert_eq!(det.class_name, "unknown");
    assert_eq!(det.confidence, 0.0);
    assert_eq!(det.bbox, None);
  }

  #[test]
  fn short_bbox_is_not_drawable() {
    let det = Detection::from_value(&json!({"class_name": "helmet", "bbox": [1, 2, 3]}));
    assert_eq!(det.bbox, Some(vec![1.0, 2.0, 3.0]));
    assert_eq!(det.drawable_bbox(), None);
  }

  #[test]
  fn classifies_by_substring() {
    assert_eq!(Category::classify("Helmet"), Category::Helmet);
    assert_eq!(Category::classify("person-1"), Category::Person);
    assert_eq!(Category::classify("debris"), Category::Other);
    assert_eq!(Category::classify("person_without_HELMET"), Category::Helmet);
  }

  #[test]
  fn label_rounds_confidence() {
    let det = Detection::new("helmet", 0.92, [100.0, 50.0, 300.0, 250.0]);
    assert_eq!(det.label(), "helmet 92%");
    let det = Detection::new("person", 0.875, [0.0, 0.0, 1.0, 1.0]);
    assert_eq!(det.label(), "person 88%");
  }

  #[test]
  fn parses_prediction_envelope() {
    let body = r#"{
      "success": true,
      "detections": [
        {"class_name": "helmet", "confidence": 0.92, "bbox": [100, 50, 300, 250]},
        {"class_name": "head", "confidence": 0.4, "bbox": []}
      ],
      "image_size": [800, 600],
      "inference_time": 0.031,
      "message": "2 object(s) detected"
    }"#;
    let prediction = Prediction::from_json(body).unwrap();
    assert_eq!(prediction.success, Some(true));
    assert_eq!(prediction.detections.len(), 2);
    assert_eq!(prediction.image_size, Some([800, 600]));
    assert_eq!(prediction.message.as_deref(), Some("2 object(s) detected"));

    let summary = Summary::of(&prediction.detections);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.drawable, 1);
    assert_eq!(summary.helmets, 1);
    assert_eq!(summary.others, 1);
  }

  #[test]
  fn out_of_range_image_size_is_dropped() {
    let prediction = Prediction::from_json(r#"{"image_size": [5000000000, 600]}"#).unwrap();
    assert_eq!(prediction.image_size, None);
    let prediction = Prediction::from_json(r#"{"image_size": [-1, 600]}"#).unwrap();
    assert_eq!(prediction.image_size, None);
    let prediction = Prediction::from_json(r#"{"image_size": [4294967295, 1]}"#).unwrap();
    assert_eq!(prediction.image_size, Some([u32::MAX, 1]));
  }

  #[test]
  fn missing_detections_is_empty_but_bad_json_fails() {
    assert!(Prediction::from_json("{}").unwrap().detections.is_empty());
    assert!(Prediction::from_json("<html>").is_err());
  }
}
