// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/stage/vehicle.rs - 车辆定位
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
use tracing::debug;

use crate::{
  geometry::{BoundingBox, Scene},
  model::{DetectResult, InferOptions, Model},
};

/// 卡车类别名，精确匹配
pub const TRUCK_LABEL: &str = "truck";
/// 其他车辆类别名，去除首尾空白并忽略大小写后匹配
pub const OTHER_VEHICLE_LABEL: &str = "other-vehicles";

/// 按检测顺序分好类的车辆
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleClassification {
  pub trucks: Vec<BoundingBox<Scene>>,
  pub other_vehicles: Vec<BoundingBox<Scene>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleSelection {
  Truck(BoundingBox<Scene>),
  OtherVehicleOnly,
  NoVehicle,
}

impl VehicleClassification {
  pub fn from_detections(result: &DetectResult) -> Self {
    let mut classification = Self::default();
    for item in result {
      if item.label == TRUCK_LABEL {
        classification.trucks.push(item.bbox_in());
      } else if item.label.trim().eq_ignore_ascii_case(OTHER_VEHICLE_LABEL) {
        classification.other_vehicles.push(item.bbox_in());
      } else {
        debug!("忽略类别 {:?}", item.label);
      }
    }
    classification
  }

  /// 有卡车时取检测顺序中的第一辆，不按置信度重新排序
  pub fn select(&self) -> VehicleSelection {
    match (self.trucks.first(), self.other_vehicles.is_empty()) {
      (Some(truck), _) => VehicleSelection::Truck(*truck),
      (None, false) => VehicleSelection::OtherVehicleOnly,
      (None, true) => VehicleSelection::NoVehicle,
    }
  }
}

pub struct VehicleLocator<M> {
  model: M,
  options: InferOptions,
}

impl<M: Model> VehicleLocator<M> {
  pub fn new(model: M) -> Self {
    Self {
      model,
      options: InferOptions::default(),
    }
  }

  pub fn classify(&self, image: &RgbImage) -> Result<VehicleClassification, M::Error> {
    let result = self.model.infer(image, &self.options)?;
    let classification = VehicleClassification::from_detections(&result);
    debug!(
      "车辆检测: {} 辆卡车, {} 辆其他车辆",
      classification.trucks.len(),
      classification.other_vehicles.len()
    );
    Ok(classification)
  }

  pub fn locate(&self, image: &RgbImage) -> Result<VehicleSelection, M::Error> {
    Ok(self.classify(image)?.select())
  }
}
