// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/record.rs - 输入图像与车牌裁剪图记录
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

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::{DirectoryRecorder, RecordStem};

/// 被记录的图像种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
  /// 原始输入
  Input,
  /// 车牌裁剪图（彩色，灰度化之前）
  Plate,
}

#[derive(Error, Debug)]
pub enum RecordError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 记录流水线中间图像。记录失败不影响流水线结果。
pub trait Recorder {
  /// 同一次调用的所有图像共享一个键
  type Key;

  fn begin(&self) -> Self::Key;
  fn record(&self, key: &Self::Key, artifact: Artifact, image: &RgbImage) -> Result<(), RecordError>;
}

/// 不记录任何内容
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRecord;

impl Recorder for NoRecord {
  type Key = ();

  fn begin(&self) -> Self::Key {}

  fn record(&self, _key: &(), _artifact: Artifact, _image: &RgbImage) -> Result<(), RecordError> {
    Ok(())
  }
}

impl<R: Recorder + ?Sized> Recorder for &R {
  type Key = R::Key;

  fn begin(&self) -> Self::Key {
    (**self).begin()
  }

  fn record(&self, key: &Self::Key, artifact: Artifact, image: &RgbImage) -> Result<(), RecordError> {
    (**self).record(key, artifact, image)
  }
}
