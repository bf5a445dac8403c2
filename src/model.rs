// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;

use crate::geometry::{BoundingBox, CoordinateFrame};

/// 目标检测模型。
///
/// 模型在进程启动时加载一次，之后只读共享；`infer` 不得修改模型状态，
/// 实现者需保证可以在多个线程中同时调用。
pub trait Model {
  type Error;

  fn infer(&self, image: &RgbImage, options: &InferOptions) -> Result<DetectResult, Self::Error>;
}

impl<M: Model + ?Sized> Model for &M {
  type Error = M::Error;

  fn infer(&self, image: &RgbImage, options: &InferOptions) -> Result<DetectResult, Self::Error> {
    (**self).infer(image, options)
  }
}

impl<M: Model + ?Sized> Model for std::sync::Arc<M> {
  type Error = M::Error;

  fn infer(&self, image: &RgbImage, options: &InferOptions) -> Result<DetectResult, Self::Error> {
    (**self).infer(image, options)
  }
}

/// 推理参数，`None` 表示使用模型后端的默认值
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InferOptions {
  /// 置信度阈值
  pub confidence: Option<f32>,
  /// NMS IoU 阈值
  pub iou: Option<f32>,
  /// 是否进行类别无关的 NMS
  pub agnostic_nms: bool,
}

impl InferOptions {
  pub fn with_confidence(mut self, confidence: f32) -> Self {
    self.confidence = Some(confidence);
    self
  }

  pub fn with_iou(mut self, iou: f32) -> Self {
    self.iou = Some(iou);
    self
  }

  pub fn with_agnostic_nms(mut self, agnostic_nms: bool) -> Self {
    self.agnostic_nms = agnostic_nms;
    self
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub label: String,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，输入图像的像素坐标
}

impl DetectItem {
  pub fn new(label: impl Into<String>, score: f32, bbox: [f32; 4]) -> Self {
    Self {
      label: label.into(),
      score,
      bbox,
    }
  }

  /// 把检测框解释为坐标系 `F` 中的整数边界框
  pub fn bbox_in<F: CoordinateFrame>(&self) -> BoundingBox<F> {
    BoundingBox::from_xyxy(&self.bbox)
  }

  /// 水平中心，保持浮点精度
  pub fn center_x(&self) -> f32 {
    (self.bbox[0] + self.bbox[2]) / 2.0
  }
}

/// 检测结果，保持检测器的输出顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem> {
    self.items.iter()
  }

  pub fn first(&self) -> Option<&DetectItem> {
    self.items.first()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

impl<'a> IntoIterator for &'a DetectResult {
  type Item = &'a DetectItem;
  type IntoIter = std::slice::Iter<'a, DetectItem>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

pub mod nms;

#[cfg(feature = "model_onnx")]
mod yolo;
#[cfg(feature = "model_onnx")]
pub use self::yolo::{YoloError, YoloOnnx, YoloOnnxBuilder};
