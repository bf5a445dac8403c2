// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/pipeline.rs - 检测流水线
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
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  geometry::{CropError, PlateCrop, TruckCrop, crop},
  model::Model,
  record::{Artifact, NoRecord, Recorder},
  result::PipelineResult,
  stage::{PlateLocator, PlateReader, VehicleLocator, VehicleSelection},
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("车辆检测失败: {0}")]
  VehicleModel(#[source] BoxError),
  #[error("车牌检测失败: {0}")]
  PlateModel(#[source] BoxError),
  #[error("字符检测失败: {0}")]
  CharacterModel(#[source] BoxError),
  #[error("裁剪失败: {0}")]
  Crop(#[from] CropError),
}

fn boxed<E: std::error::Error + Send + Sync + 'static>(err: E) -> BoxError {
  Box::new(err)
}

/// 输入一张图像，输出一次检测结果
pub trait Detect {
  fn detect(&self, image: &RgbImage) -> Result<PipelineResult, PipelineError>;
}

/// 卡车 → 车牌 → 字符 三阶段流水线。
///
/// 三个模型在构造时注入，流水线本身不持有可变状态，可以被多个线程共享。
pub struct Pipeline<V, P, C, R = NoRecord> {
  vehicle: VehicleLocator<V>,
  plate: PlateLocator<P>,
  reader: PlateReader<C>,
  recorder: R,
}

impl<V: Model, P: Model, C: Model> Pipeline<V, P, C, NoRecord> {
  pub fn new(vehicle_model: V, plate_model: P, character_model: C) -> Self {
    Self {
      vehicle: VehicleLocator::new(vehicle_model),
      plate: PlateLocator::new(plate_model),
      reader: PlateReader::new(character_model),
      recorder: NoRecord,
    }
  }
}

impl<V, P, C, R> Pipeline<V, P, C, R> {
  pub fn with_recorder<R2: Recorder>(self, recorder: R2) -> Pipeline<V, P, C, R2> {
    Pipeline {
      vehicle: self.vehicle,
      plate: self.plate,
      reader: self.reader,
      recorder,
    }
  }
}

impl<V, P, C, R> Pipeline<V, P, C, R>
where
  V: Model,
  P: Model,
  C: Model,
  V::Error: std::error::Error + Send + Sync + 'static,
  P::Error: std::error::Error + Send + Sync + 'static,
  C::Error: std::error::Error + Send + Sync + 'static,
  R: Recorder,
{
  pub fn run(&self, image: &RgbImage) -> Result<PipelineResult, PipelineError> {
    let key = self.recorder.begin();
    self.record(&key, Artifact::Input, image);

    let truck_box = match self
      .vehicle
      .locate(image)
      .map_err(|e| PipelineError::VehicleModel(boxed(e)))?
    {
      VehicleSelection::Truck(truck_box) => truck_box,
      VehicleSelection::OtherVehicleOnly => {
        info!("只检测到其他车辆");
        return Ok(PipelineResult::OtherVehicleOnly);
      }
      VehicleSelection::NoVehicle => {
        info!("未检测到车辆");
        return Ok(PipelineResult::NoVehicle);
      }
    };
    debug!("选中卡车 {:?}", truck_box);
    let truck = crop::<TruckCrop>(image, &truck_box)?;

    let plate_box = match self
      .plate
      .locate(&truck)
      .map_err(|e| PipelineError::PlateModel(boxed(e)))?
    {
      Some(plate_box) => plate_box,
      None => {
        info!("卡车上未找到车牌");
        return Ok(PipelineResult::TruckNoPlate);
      }
    };
    debug!("选中车牌 {:?}", plate_box);
    let plate = crop::<PlateCrop>(&truck.image, &plate_box)?;
    self.record(&key, Artifact::Plate, &plate.image);

    let reading = self
      .reader
      .read(&plate)
      .map_err(|e| PipelineError::CharacterModel(boxed(e)))?;
    let result = PipelineResult::from_plate_text(reading.text);
    info!("车牌读取结果: {}", result);

    Ok(result)
  }

  fn record(&self, key: &R::Key, artifact: Artifact, image: &RgbImage) {
    if let Err(e) = self.recorder.record(key, artifact, image) {
      warn!("记录 {:?} 图像失败: {}", artifact, e);
    }
  }
}

impl<V, P, C, R> Detect for Pipeline<V, P, C, R>
where
  V: Model,
  P: Model,
  C: Model,
  V::Error: std::error::Error + Send + Sync + 'static,
  P::Error: std::error::Error + Send + Sync + 'static,
  C::Error: std::error::Error + Send + Sync + 'static,
  R: Recorder,
{
  fn detect(&self, image: &RgbImage) -> Result<PipelineResult, PipelineError> {
    self.run(image)
  }
}
