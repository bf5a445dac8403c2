// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/input.rs - 图像输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("I/O error: {0}")]
  IoError(std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(image::ImageError),
  #[error("Empty image")]
  EmptyImage,
}

impl From<std::io::Error> for InputError {
  fn from(err: std::io::Error) -> Self {
    InputError::IoError(err)
  }
}

impl From<image::ImageError> for InputError {
  fn from(err: image::ImageError) -> Self {
    InputError::ImageLoadError(err)
  }
}

fn non_empty(image: RgbImage) -> Result<RgbImage, InputError> {
  if image.width() == 0 || image.height() == 0 {
    return Err(InputError::EmptyImage);
  }
  Ok(image)
}

/// 从内存中的编码数据（JPEG、PNG 等）解码为 RGB 图像
pub fn decode_image(data: &[u8]) -> Result<RgbImage, InputError> {
  let image = ImageReader::new(std::io::Cursor::new(data))
    .with_guessed_format()?
    .decode()?;
  non_empty(image.to_rgb8())
}

/// 单张图像文件，作为只产生一帧的迭代器使用
pub struct ImageFileInput {
  url: Url,
  image: Option<RgbImage>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for ImageFileInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemaMismatch);
    }

    let image = ImageReader::open(url.path())?.decode()?;

    Ok(ImageFileInput {
      url: url.clone(),
      image: Some(non_empty(image.to_rgb8())?),
    })
  }
}

impl ImageFileInput {
  pub fn url(&self) -> &Url {
    &self.url
  }
}

impl Iterator for ImageFileInput {
  type Item = RgbImage;

  fn next(&mut self) -> Option<Self::Item> {
    self.image.take()
  }
}
