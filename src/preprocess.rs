// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/preprocess.rs - 车牌图像预处理
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

use image::{GrayImage, Luma, Rgb, RgbImage};

// BT.601 定点系数，14 位小数
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;
const LUMA_ROUND: u32 = 1 << (LUMA_SHIFT - 1);

/// 单个像素的亮度
pub fn luma(pixel: &Rgb<u8>) -> u8 {
  let [r, g, b] = pixel.0;
  let y = (r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B + LUMA_ROUND) >> LUMA_SHIFT;
  y.min(u8::MAX as u32) as u8
}

pub fn to_gray(image: &RgbImage) -> GrayImage {
  GrayImage::from_fn(image.width(), image.height(), |x, y| {
    Luma([luma(image.get_pixel(x, y))])
  })
}

/// 转为灰度后再复制成三通道。字符检测模型只接受三通道输入。
pub fn to_gray3(image: &RgbImage) -> RgbImage {
  let gray = to_gray(image);
  RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
    let Luma([v]) = *gray.get_pixel(x, y);
    Rgb([v, v, v])
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn primaries_follow_bt601_weights() {
    assert_eq!(luma(&Rgb([255, 0, 0])), 76);
    assert_eq!(luma(&Rgb([0, 255, 0])), 150);
    assert_eq!(luma(&Rgb([0, 0, 255])), 29);
    assert_eq!(luma(&Rgb([255, 255, 255])), 255);
    assert_eq!(luma(&Rgb([0, 0, 0])), 0);
  }

  #[test]
  fn gray3_has_equal_channels_and_same_size() {
    let image = RgbImage::from_fn(7, 3, |x, y| Rgb([(x * 30) as u8, (y * 80) as u8, 200]));
    let gray = to_gray3(&image);

    assert_eq!(gray.dimensions(), (7, 3));
    for (x, y, pixel) in gray.enumerate_pixels() {
      let [r, g, b] = pixel.0;
      assert_eq!(r, g);
      assert_eq!(g, b);
      assert_eq!(r, luma(image.get_pixel(x, y)));
    }
  }
}
