// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/stage/plate.rs - 车牌定位
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
  geometry::{BoundingBox, Crop, TruckCrop},
  model::{InferOptions, Model},
};

pub const PLATE_CONFIDENCE: f32 = 0.5;

pub struct PlateLocator<M> {
  model: M,
  options: InferOptions,
}

impl<M: Model> PlateLocator<M> {
  pub fn new(model: M) -> Self {
    Self {
      model,
      options: InferOptions::default().with_confidence(PLATE_CONFIDENCE),
    }
  }

  /// 在卡车裁剪图中找车牌，取检测顺序中的第一个
  pub fn locate(&self, truck: &Crop<TruckCrop>) -> Result<Option<BoundingBox<TruckCrop>>, M::Error> {
    let result = self.model.infer(&truck.image, &self.options)?;
    debug!("车牌检测: {} 个候选", result.len());
    Ok(result.first().map(|item| item.bbox_in()))
  }
}
