// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/plate_text.rs - 车牌文本重建
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

//! 车牌文本由逐个检测到的字符按水平位置从左到右拼接而成，
//! 再按固定格式 `数字x2 字母x3 数字x2` 校验。

use std::ops::Range;

use crate::model::DetectItem;

/// 参与校验的字符个数，多出的字符被丢弃
pub const PLATE_LENGTH: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupKind {
  Digits,
  Letters,
}

impl GroupKind {
  fn accepts(&self, group: &str) -> bool {
    !group.is_empty()
      && match self {
        GroupKind::Digits => group.chars().all(|c| c.is_ascii_digit()),
        GroupKind::Letters => group.chars().all(|c| c.is_ascii_alphabetic()),
      }
  }
}

const PLATE_GROUPS: [(Range<usize>, GroupKind); 3] = [
  (0..2, GroupKind::Digits),
  (2..5, GroupKind::Letters),
  (5..7, GroupKind::Digits),
];

/// 车牌裁剪图中检测到的单个字符
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedCharacter {
  pub center_x: f32,
  pub label: String,
}

impl DetectedCharacter {
  pub fn new(center_x: f32, label: impl Into<String>) -> Self {
    Self {
      center_x,
      label: label.into(),
    }
  }
}

impl From<&DetectItem> for DetectedCharacter {
  fn from(item: &DetectItem) -> Self {
    DetectedCharacter::new(item.center_x(), item.label.clone())
  }
}

/// 按水平中心升序排序（稳定排序，中心相同时保持检测顺序）
pub fn order_left_to_right(mut characters: Vec<DetectedCharacter>) -> Vec<DetectedCharacter> {
  characters.sort_by(|a, b| a.center_x.total_cmp(&b.center_x));
  characters
}

/// 用排好序的字符标签拼出车牌文本，格式不符时返回 `None`
pub fn assemble<S: AsRef<str>>(labels: &[S]) -> Option<String> {
  if labels.len() < PLATE_LENGTH {
    return None;
  }

  let mut groups = Vec::with_capacity(PLATE_GROUPS.len());
  for (range, kind) in PLATE_GROUPS.iter() {
    let mut group = String::new();
    for label in &labels[range.clone()] {
      group.push_str(label.as_ref());
    }
    if !kind.accepts(&group) {
      return None;
    }
    groups.push(group);
  }

  Some(groups.join(" "))
}

/// 排序并拼接，完整的字符重建流程
pub fn read_plate(characters: Vec<DetectedCharacter>) -> Option<String> {
  let labels: Vec<String> = order_left_to_right(characters)
    .into_iter()
    .map(|c| c.label)
    .collect();
  assemble(&labels)
}
