// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/stage.rs - 流水线各阶段
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

//! 三个阶段严格按顺序执行：车辆定位 → 车牌定位 → 车牌读取。
//! 每个阶段只看上一阶段给出的裁剪图，检测框坐标都相对于该裁剪图。

mod plate;
mod reader;
mod vehicle;

pub use self::plate::{PLATE_CONFIDENCE, PlateLocator};
pub use self::reader::{OCR_CONFIDENCE, OCR_IOU, PlateReader, PlateReading};
pub use self::vehicle::{
  OTHER_VEHICLE_LABEL, TRUCK_LABEL, VehicleClassification, VehicleLocator, VehicleSelection,
};
