// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/stage/reader.rs - 车牌读取
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

use tracing::debug;

use crate::{
  geometry::{Crop, PlateCrop},
  model::{InferOptions, Model},
  plate_text::{self, DetectedCharacter},
  preprocess::to_gray3,
};

pub const OCR_CONFIDENCE: f32 = 0.5;
pub const OCR_IOU: f32 = 0.5;

/// 一次读取的结果：排好序的字符以及通过格式校验的文本
#[derive(Debug, Clone, PartialEq)]
pub struct PlateReading {
  pub characters: Vec<DetectedCharacter>,
  pub text: Option<String>,
}

pub struct PlateReader<M> {
  model: M,
  options: InferOptions,
}

impl<M: Model> PlateReader<M> {
  pub fn new(model: M) -> Self {
    Self {
      model,
      // 类别无关的 NMS：重叠的不同字符只保留一个
      options: InferOptions::default()
        .with_confidence(OCR_CONFIDENCE)
        .with_iou(OCR_IOU)
        .with_agnostic_nms(true),
    }
  }

  pub fn read(&self, plate: &Crop<PlateCrop>) -> Result<PlateReading, M::Error> {
    let gray = to_gray3(&plate.image);
    let result = self.model.infer(&gray, &self.options)?;

    let characters =
      plate_text::order_left_to_right(result.iter().map(DetectedCharacter::from).collect());
    let labels: Vec<&str> = characters.iter().map(|c| c.label.as_str()).collect();
    let text = plate_text::assemble(&labels);
    debug!("字符检测: {:?} -> {:?}", labels, text);

    Ok(PlateReading { characters, text })
  }
}
