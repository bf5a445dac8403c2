// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/result.rs - 流水线结果
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

use std::fmt;

use serde_json::{Value, json};

pub const STATUS_NONE: &str = "none";
pub const STATUS_OTHER_VEHICLE: &str = "other-vehicle";
pub const STATUS_TRUCK: &str = "truck";
pub const OTHER_VEHICLE_WARNING: &str = "Other vehicle detected (label 1).";

/// 一次流水线调用的结果，每次调用只产生其中一种
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineResult {
  NoVehicle,
  OtherVehicleOnly,
  TruckNoPlate,
  TruckPlateUnreadable,
  TruckPlateRead(String),
}

impl PipelineResult {
  /// 由车牌读取结果构造，`None` 表示找到了车牌但读不出来
  pub fn from_plate_text(text: Option<String>) -> Self {
    match text {
      Some(text) => PipelineResult::TruckPlateRead(text),
      None => PipelineResult::TruckPlateUnreadable,
    }
  }

  pub fn status(&self) -> &'static str {
    match self {
      PipelineResult::NoVehicle => STATUS_NONE,
      PipelineResult::OtherVehicleOnly => STATUS_OTHER_VEHICLE,
      PipelineResult::TruckNoPlate
      | PipelineResult::TruckPlateUnreadable
      | PipelineResult::TruckPlateRead(_) => STATUS_TRUCK,
    }
  }

  /// 车牌文本。读不出来时为空字符串，没有车牌时为 `None`。
  pub fn plate(&self) -> Option<&str> {
    match self {
      PipelineResult::TruckPlateUnreadable => Some(""),
      PipelineResult::TruckPlateRead(text) => Some(text.as_str()),
      _ => None,
    }
  }

  pub fn warning(&self) -> Option<&'static str> {
    match self {
      PipelineResult::OtherVehicleOnly => Some(OTHER_VEHICLE_WARNING),
      _ => None,
    }
  }

  pub fn is_truck(&self) -> bool {
    self.status() == STATUS_TRUCK
  }

  /// 响应体。只有卡车结果带 `plate` 字段，没有车牌时为 `null`。
  pub fn to_json(&self) -> Value {
    match self {
      PipelineResult::NoVehicle => json!({ "status": STATUS_NONE }),
      PipelineResult::OtherVehicleOnly => json!({
        "status": STATUS_OTHER_VEHICLE,
        "warning": OTHER_VEHICLE_WARNING,
      }),
      _ => json!({ "status": STATUS_TRUCK, "plate": self.plate() }),
    }
  }
}

impl fmt::Display for PipelineResult {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_json())
  }
}
