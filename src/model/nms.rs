// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

/// NMS 候选框
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
  pub class_id: usize,
  pub score: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]
}

/// 非极大值抑制。
///
/// 按置信度降序处理，保留的框与已保留框的 IoU 不得超过 `iou_threshold`。
/// `agnostic` 为真时不同类别的框也会互相抑制。返回结果按置信度降序排列，
/// 最多 `max_det` 个。
pub fn nms(
  mut candidates: Vec<Candidate>,
  iou_threshold: f32,
  agnostic: bool,
  max_det: usize,
) -> Vec<Candidate> {
  candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

  let mut kept: Vec<Candidate> = Vec::new();
  for candidate in candidates {
    if kept.len() >= max_det {
      break;
    }
    let suppressed = kept.iter().any(|best| {
      (agnostic || best.class_id == candidate.class_id)
        && iou(&best.bbox, &candidate.bbox) > iou_threshold
    });
    if !suppressed {
      kept.push(candidate);
    }
  }

  kept
}

/// 计算两个边界框的 IoU
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  let x1 = a[0].max(b[0]);
  let y1 = a[1].max(b[1]);
  let x2 = a[2].min(b[2]);
  let y2 = a[3].min(b[3]);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
  let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
  let union = area_a + area_b - intersection;

  if union > 0.0 {
    intersection / union
  } else {
    0.0
  }
}
