// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/geometry.rs - 坐标系与边界框
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
use std::marker::PhantomData;

use image::{RgbImage, imageops};
use thiserror::Error;

/// 坐标系标记。每个边界框都属于某一张图像（原图或裁剪图）的局部坐标系。
pub trait CoordinateFrame: fmt::Debug + Clone + Copy + PartialEq + Eq {
  const NAME: &'static str;
}

/// 由父坐标系裁剪得到的子坐标系
pub trait SubFrame: CoordinateFrame {
  type Parent: CoordinateFrame;
}

/// 原始输入图像
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scene;

/// 卡车裁剪图，父坐标系为原图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruckCrop;

/// 车牌裁剪图，父坐标系为卡车裁剪图
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlateCrop;

impl CoordinateFrame for Scene {
  const NAME: &'static str = "scene";
}

impl CoordinateFrame for TruckCrop {
  const NAME: &'static str = "truck";
}

impl CoordinateFrame for PlateCrop {
  const NAME: &'static str = "plate";
}

impl SubFrame for TruckCrop {
  type Parent = Scene;
}

impl SubFrame for PlateCrop {
  type Parent = TruckCrop;
}

/// 像素坐标边界框 [x1, y1, x2, y2]，坐标相对于坐标系 `F` 所指的图像
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox<F: CoordinateFrame> {
  pub x1: i32,
  pub y1: i32,
  pub x2: i32,
  pub y2: i32,
  _frame: PhantomData<F>,
}

impl<F: CoordinateFrame> fmt::Debug for BoundingBox<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{}[{}, {}, {}, {}]",
      F::NAME,
      self.x1,
      self.y1,
      self.x2,
      self.y2
    )
  }
}

impl<F: CoordinateFrame> BoundingBox<F> {
  pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
    Self {
      x1,
      y1,
      x2,
      y2,
      _frame: PhantomData,
    }
  }

  /// 由检测器输出的浮点坐标构造，按 `as i32` 向零截断
  pub fn from_xyxy(bbox: &[f32; 4]) -> Self {
    Self::new(
      bbox[0] as i32,
      bbox[1] as i32,
      bbox[2] as i32,
      bbox[3] as i32,
    )
  }

  pub fn width(&self) -> i32 {
    self.x2 - self.x1
  }

  pub fn height(&self) -> i32 {
    self.y2 - self.y1
  }

  pub fn is_empty(&self) -> bool {
    self.x2 <= self.x1 || self.y2 <= self.y1
  }

  pub fn as_array(&self) -> [i32; 4] {
    [self.x1, self.y1, self.x2, self.y2]
  }
}

impl<F: SubFrame> BoundingBox<F> {
  /// 平移到父坐标系。`origin` 是当前裁剪图在父坐标系中的区域。
  pub fn to_parent(&self, origin: &BoundingBox<F::Parent>) -> BoundingBox<F::Parent> {
    BoundingBox::new(
      self.x1 + origin.x1,
      self.y1 + origin.y1,
      self.x2 + origin.x1,
      self.y2 + origin.y1,
    )
  }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CropError {
  #[error("裁剪区域为空: {region:?}, 图像尺寸 {width}x{height}")]
  Empty {
    region: [i32; 4],
    width: u32,
    height: u32,
  },
}

/// 裁剪得到的子图像，记录其在父坐标系中的位置
#[derive(Debug, Clone)]
pub struct Crop<F: SubFrame> {
  pub image: RgbImage,
  pub origin: BoundingBox<F::Parent>,
}

/// 按边界框裁剪父图像。超出图像的部分被截掉，结果为空时返回错误。
pub fn crop<F: SubFrame>(
  parent: &RgbImage,
  region: &BoundingBox<F::Parent>,
) -> Result<Crop<F>, CropError> {
  let (width, height) = parent.dimensions();
  let x1 = region.x1.clamp(0, width as i32);
  let y1 = region.y1.clamp(0, height as i32);
  let x2 = region.x2.clamp(0, width as i32);
  let y2 = region.y2.clamp(0, height as i32);

  if x2 <= x1 || y2 <= y1 {
    return Err(CropError::Empty {
      region: region.as_array(),
      width,
      height,
    });
  }

  let image = imageops::crop_imm(
    parent,
    x1 as u32,
    y1 as u32,
    (x2 - x1) as u32,
    (y2 - y1) as u32,
  )
  .to_image();

  Ok(Crop {
    image,
    origin: BoundingBox::new(x1, y1, x2, y2),
  })
}
