// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/model/yolo.rs - YOLO ONNX 模型
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

use std::path::PathBuf;

use image::{Rgb, RgbImage, imageops};
use thiserror::Error;
use tracing::{debug, error, info};
use tract_onnx::prelude::*;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{
    DetectItem, DetectResult, InferOptions, Model,
    nms::{Candidate, nms},
  },
};

const YOLO_SCHEME: &str = "onnx";
const YOLO_DEFAULT_INPUT_SIZE: u32 = 640;
const YOLO_DEFAULT_CONFIDENCE: f32 = 0.25;
const YOLO_DEFAULT_IOU: f32 = 0.7;
const YOLO_MAX_DET: usize = 300;
const YOLO_PAD_VALUE: u8 = 114;
// cx, cy, w, h
const YOLO_BOX_ROWS: usize = 4;

type YoloPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, TypedModel>;

/// ultralytics 导出的 YOLO 检测模型，输出形状为 `[1, 4 + 类别数, 锚点数]`
pub struct YoloOnnx {
  plan: YoloPlan,
  labels: Box<[String]>,
  input_size: u32,
}

#[derive(Error, Debug)]
pub enum YoloError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(std::io::Error),
  #[error("推理错误: {0}")]
  TractError(TractError),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型输出形状不符: {0:?}")]
  OutputShape(Vec<usize>),
  #[error("标签数量不符: 模型输出 {classes} 类, 标签 {labels} 个")]
  LabelMismatch { classes: usize, labels: usize },
  #[error("没有可用的类别名: 未指定 labels 且模型 {0} 不含 names 元数据")]
  MissingLabels(PathBuf),
  #[error("无法解析模型元数据中的 names: {0}")]
  LabelMetadata(String),
}

impl From<std::io::Error> for YoloError {
  fn from(err: std::io::Error) -> Self {
    YoloError::ModelLoadError(err)
  }
}

impl From<TractError> for YoloError {
  fn from(err: TractError) -> Self {
    YoloError::TractError(err)
  }
}

pub struct YoloOnnxBuilder {
  model_path: PathBuf,
  labels_path: Option<PathBuf>,
  labels: Option<Vec<String>>,
  input_size: u32,
}

impl FromUrlWithScheme for YoloOnnxBuilder {
  const SCHEME: &'static str = YOLO_SCHEME;
}

impl FromUrl for YoloOnnxBuilder {
  type Error = YoloError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(YoloError::ModelPathError(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut labels_path = None;
    let mut input_size = YOLO_DEFAULT_INPUT_SIZE;
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "labels" => labels_path = Some(PathBuf::from(v.as_ref())),
        "size" => {
          input_size = v
            .parse()
            .map_err(|_| YoloError::ModelPathError(format!("无效的输入尺寸: {}", v)))?;
        }
        _ => debug!("忽略未知的模型参数: {}={}", k, v),
      }
    }

    Ok(YoloOnnxBuilder {
      model_path: PathBuf::from(url.path()),
      labels_path,
      labels: None,
      input_size,
    })
  }
}

impl YoloOnnxBuilder {
  pub fn new(model_path: impl Into<PathBuf>) -> Self {
    Self {
      model_path: model_path.into(),
      labels_path: None,
      labels: None,
      input_size: YOLO_DEFAULT_INPUT_SIZE,
    }
  }

  pub fn labels(mut self, labels: Vec<String>) -> Self {
    self.labels = Some(labels);
    self
  }

  pub fn input_size(mut self, input_size: u32) -> Self {
    self.input_size = input_size;
    self
  }

  /// 显式给出的标签优先，其次是标签文件；都没有时返回 `None`
  fn load_labels(&self) -> Result<Option<Vec<String>>, YoloError> {
    if let Some(labels) = &self.labels {
      return Ok(Some(labels.clone()));
    }
    match &self.labels_path {
      Some(path) => {
        info!("加载标签文件: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Ok(Some(parse_labels(&content)))
      }
      None => Ok(None),
    }
  }

  pub fn build(self) -> Result<YoloOnnx, YoloError> {
    let onnx = tract_onnx::onnx();

    let labels = match self.load_labels()? {
      Some(labels) => labels,
      None => {
        info!("从模型元数据读取类别名: {}", self.model_path.display());
        let proto = onnx.proto_model_for_path(&self.model_path)?;
        labels_from_metadata(
          proto
            .metadata_props
            .iter()
            .map(|prop| (prop.key.as_str(), prop.value.as_str())),
        )?
        .unwrap_or_default()
      }
    };
    if labels.is_empty() {
      error!("模型 {} 没有类别名", self.model_path.display());
      return Err(YoloError::MissingLabels(self.model_path));
    }
    debug!("模型标签: {:?}", labels);

    info!("加载模型文件: {}", self.model_path.display());
    let size = self.input_size as usize;
    let plan = onnx
      .model_for_path(&self.model_path)?
      .with_input_fact(0, f32::fact([1, 3, size, size]).into())?
      .into_optimized()?
      .into_runnable()?;
    info!("模型加载完成, 输入尺寸 {}x{}", size, size);

    Ok(YoloOnnx {
      plan,
      labels: labels.into_boxed_slice(),
      input_size: self.input_size,
    })
  }
}

/// 每行一个类别名，行号即类别编号；忽略末尾空行
fn parse_labels(content: &str) -> Vec<String> {
  let mut labels: Vec<String> = content.lines().map(|line| line.trim_end().to_string()).collect();
  while labels.last().is_some_and(|label| label.is_empty()) {
    labels.pop();
  }
  labels
}

/// ultralytics 导出模型时写入的类别名元数据键
const NAMES_METADATA_KEY: &str = "names";

/// 从 ONNX 元数据中取出类别名，没有 `names` 条目时返回 `None`
fn labels_from_metadata<'a>(
  props: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<Option<Vec<String>>, YoloError> {
  props
    .into_iter()
    .find(|(key, _)| *key == NAMES_METADATA_KEY)
    .map(|(_, value)| parse_names(value))
    .transpose()
}

/// 解析形如 `{0: 'truck', 1: 'other-vehicles'}` 的类别表，编号必须从 0 连续
fn parse_names(value: &str) -> Result<Vec<String>, YoloError> {
  let invalid = || YoloError::LabelMetadata(value.to_string());
  let body = value
    .trim()
    .strip_prefix('{')
    .and_then(|body| body.strip_suffix('}'))
    .ok_or_else(invalid)?;

  let mut chars = body.chars().peekable();
  let mut entries: Vec<(usize, String)> = Vec::new();
  loop {
    while chars.next_if(|c| c.is_whitespace()).is_some() {}
    if chars.peek().is_none() {
      break;
    }

    let mut key = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
      key.push(c);
    }
    let key: usize = key.parse().map_err(|_| invalid())?;

    while chars.next_if(|c| c.is_whitespace()).is_some() {}
    chars.next_if_eq(&':').ok_or_else(invalid)?;
    while chars.next_if(|c| c.is_whitespace()).is_some() {}

    let quote = chars
      .next_if(|c| *c == '\'' || *c == '"')
      .ok_or_else(invalid)?;
    let mut name = String::new();
    loop {
      match chars.next() {
        Some('\\') => name.push(chars.next().ok_or_else(invalid)?),
        Some(c) if c == quote => break,
        Some(c) => name.push(c),
        None => return Err(invalid()),
      }
    }
    entries.push((key, name));

    while chars.next_if(|c| c.is_whitespace()).is_some() {}
    match chars.next() {
      Some(',') | None => {}
      Some(_) => return Err(invalid()),
    }
  }

  entries.sort_by_key(|(key, _)| *key);
  if entries.iter().enumerate().any(|(i, (key, _))| i != *key) {
    return Err(invalid());
  }
  Ok(entries.into_iter().map(|(_, name)| name).collect())
}

/// 把图像等比缩放并居中贴到正方形画布上之后的变换参数
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
  scale: f32,
  pad_x: f32,
  pad_y: f32,
  width: f32,
  height: f32,
}

impl Letterbox {
  fn new(width: u32, height: u32, size: u32) -> (Self, u32, u32) {
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
    let letterbox = Letterbox {
      scale,
      pad_x: ((size - new_w) / 2) as f32,
      pad_y: ((size - new_h) / 2) as f32,
      width: width as f32,
      height: height as f32,
    };
    (letterbox, new_w, new_h)
  }

  /// 把模型输入坐标系中的框映射回原图并截断到图像范围内
  fn restore(&self, bbox: [f32; 4]) -> [f32; 4] {
    [
      ((bbox[0] - self.pad_x) / self.scale).clamp(0.0, self.width),
      ((bbox[1] - self.pad_y) / self.scale).clamp(0.0, self.height),
      ((bbox[2] - self.pad_x) / self.scale).clamp(0.0, self.width),
      ((bbox[3] - self.pad_y) / self.scale).clamp(0.0, self.height),
    ]
  }
}

impl YoloOnnx {
  fn preprocess(&self, image: &RgbImage) -> (Tensor, Letterbox) {
    let (width, height) = image.dimensions();
    let (letterbox, new_w, new_h) = Letterbox::new(width, height, self.input_size);

    let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(
      self.input_size,
      self.input_size,
      Rgb([YOLO_PAD_VALUE; 3]),
    );
    imageops::replace(
      &mut canvas,
      &resized,
      letterbox.pad_x as i64,
      letterbox.pad_y as i64,
    );

    let size = self.input_size as usize;
    let tensor = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
      canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
    .into_tensor();

    (tensor, letterbox)
  }
}

/// 解码 `[1, 4 + 类别数, 锚点数]` 的模型输出：每个锚点取得分最高的类别，
/// 得分严格大于置信度阈值才保留，框映射回原图后做 NMS。
fn postprocess(
  labels: &[String],
  output: &Tensor,
  letterbox: &Letterbox,
  options: &InferOptions,
) -> Result<DetectResult, YoloError> {
  let view = output.to_array_view::<f32>()?;
  let shape = view.shape().to_vec();
  if shape.len() != 3 || shape[0] != 1 || shape[1] <= YOLO_BOX_ROWS {
    error!("模型输出形状不符: {:?}", shape);
    return Err(YoloError::OutputShape(shape));
  }
  let view = view
    .into_dimensionality::<tract_ndarray::Ix3>()
    .map_err(|_| YoloError::OutputShape(shape.clone()))?;

  let num_classes = shape[1] - YOLO_BOX_ROWS;
  let num_anchors = shape[2];
  if labels.len() != num_classes {
    return Err(YoloError::LabelMismatch {
      classes: num_classes,
      labels: labels.len(),
    });
  }

  let confidence = options.confidence.unwrap_or(YOLO_DEFAULT_CONFIDENCE);
  let iou = options.iou.unwrap_or(YOLO_DEFAULT_IOU);

  let mut candidates = Vec::new();
  for anchor in 0..num_anchors {
    let (class_id, score) = (0..num_classes)
      .map(|c| (c, view[[0, YOLO_BOX_ROWS + c, anchor]]))
      .fold((0, f32::MIN), |best, current| {
        if current.1 > best.1 { current } else { best }
      });

    if score <= confidence {
      continue;
    }

    let cx = view[[0, 0, anchor]];
    let cy = view[[0, 1, anchor]];
    let w = view[[0, 2, anchor]];
    let h = view[[0, 3, anchor]];

    candidates.push(Candidate {
      class_id,
      score,
      bbox: letterbox.restore([cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]),
    });
  }
  debug!("置信度过滤后剩余 {} 个候选框", candidates.len());

  let items: Vec<DetectItem> = nms(candidates, iou, options.agnostic_nms, YOLO_MAX_DET)
    .into_iter()
    .map(|c| DetectItem::new(labels[c.class_id].clone(), c.score, c.bbox))
    .collect();
  debug!("检测到 {} 个物体", items.len());

  Ok(DetectResult::from(items))
}

impl Model for YoloOnnx {
  type Error = YoloError;

  fn infer(&self, image: &RgbImage, options: &InferOptions) -> Result<DetectResult, Self::Error> {
    debug!("设置模型输入, 图像尺寸 {:?}", image.dimensions());
    let (input, letterbox) = self.preprocess(image);

    debug!("执行模型推理");
    let outputs = self.plan.run(tvec!(input.into_tvalue()))?;

    debug!("后处理模型输出");
    postprocess(&self.labels, &outputs[0], &letterbox, options)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn url_carries_labels_and_input_size() {
    let url = Url::parse("onnx:///models/truck.onnx?labels=/models/truck.txt&size=320").unwrap();
    let builder = YoloOnnxBuilder::from_url(&url).unwrap();
    assert_eq!(builder.model_path, PathBuf::from("/models/truck.onnx"));
    assert_eq!(builder.labels_path, Some(PathBuf::from("/models/truck.txt")));
    assert_eq!(builder.input_size, 320);
  }

  #[test]
  fn url_with_wrong_scheme_is_rejected() {
    let url = Url::parse("image:///models/truck.onnx").unwrap();
    assert!(matches!(
      YoloOnnxBuilder::from_url(&url),
      Err(YoloError::ModelPathError(_))
    ));
  }

  #[test]
  fn labels_file_keeps_line_order() {
    let labels = parse_labels("other-vehicles\ntruck\n\n");
    assert_eq!(labels, vec!["other-vehicles", "truck"]);
  }

  #[test]
  fn letterbox_maps_back_to_input_image() {
    // 1280x640 -> 640x320，上下各填充 160
    let (letterbox, new_w, new_h) = Letterbox::new(1280, 640, 640);
    assert_eq!((new_w, new_h), (640, 320));
    assert_eq!(letterbox.pad_y, 160.0);

    let restored = letterbox.restore([100.0, 200.0, 300.0, 400.0]);
    assert_eq!(restored, [200.0, 80.0, 600.0, 480.0]);

    let clamped = letterbox.restore([-10.0, 100.0, 700.0, 600.0]);
    assert_eq!(clamped, [0.0, 0.0, 1280.0, 640.0]);
  }

  #[test]
  fn empty_label_list_is_rejected_before_loading_the_model() {
    let result = YoloOnnxBuilder::new("/nonexistent/truck.onnx")
      .labels(Vec::new())
      .build();
    assert!(matches!(
      result,
      Err(YoloError::MissingLabels(path)) if path == PathBuf::from("/nonexistent/truck.onnx")
    ));
  }

  #[test]
  fn empty_labels_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let labels_path = dir.path().join("labels.txt");
    std::fs::write(&labels_path, "\n\n").unwrap();

    let url = Url::parse(&format!(
      "onnx:///nonexistent/truck.onnx?labels={}",
      labels_path.display()
    ))
    .unwrap();
    let result = YoloOnnxBuilder::from_url(&url).unwrap().build();
    assert!(matches!(result, Err(YoloError::MissingLabels(_))));
  }

  #[test]
  fn names_come_from_ultralytics_metadata() {
    let props = [
      ("author", "Ultralytics"),
      ("stride", "32"),
      ("names", "{0: 'truck', 1: 'other-vehicles'}"),
    ];
    assert_eq!(
      labels_from_metadata(props).unwrap(),
      Some(vec!["truck".to_string(), "other-vehicles".to_string()])
    );
    assert_eq!(labels_from_metadata([("author", "Ultralytics")]).unwrap(), None);
  }

  #[test]
  fn names_accept_both_quote_styles_in_any_key_order() {
    let names = parse_names(r#"{1: "driver's cab", 0: 'A', 2: 'it\'s'}"#).unwrap();
    assert_eq!(names, vec!["A", "driver's cab", "it's"]);
  }

  #[test]
  fn malformed_names_are_rejected() {
    for value in [
      "['truck', 'bus']",
      "{0: truck}",
      "{0: 'truck' 1: 'bus'}",
      "{0: 'truck', 2: 'bus'}",
      "{0: 'truck",
    ] {
      assert!(
        matches!(parse_names(value), Err(YoloError::LabelMetadata(_))),
        "{}",
        value
      );
    }
  }

  fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
  }

  /// 按行给出模型输出：前四行为 cx, cy, w, h，之后每行一个类别的得分
  fn output(rows: &[&[f32]]) -> Tensor {
    tract_ndarray::Array3::from_shape_fn((1, rows.len(), rows[0].len()), |(_, r, a)| rows[r][a])
      .into_tensor()
  }

  fn unscaled() -> Letterbox {
    Letterbox::new(640, 640, 640).0
  }

  #[test]
  fn score_equal_to_confidence_is_dropped() {
    let output = output(&[
      &[50.0, 300.0],
      &[50.0, 50.0],
      &[20.0, 20.0],
      &[20.0, 20.0],
      &[0.5, 0.51],
    ]);
    let options = InferOptions::default().with_confidence(0.5);

    let result = postprocess(&names(&["plate"]), &output, &unscaled(), &options).unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].score, 0.51);
    assert_eq!(result.items[0].bbox, [290.0, 40.0, 310.0, 60.0]);
  }

  #[test]
  fn best_class_per_anchor_names_the_detection() {
    let output = output(&[&[100.0], &[100.0], &[40.0], &[40.0], &[0.3], &[0.8]]);
    let result = postprocess(
      &names(&["truck", "other-vehicles"]),
      &output,
      &unscaled(),
      &InferOptions::default(),
    )
    .unwrap();

    assert_eq!(result.len(), 1);
    assert_eq!(result.items[0].label, "other-vehicles");
    assert_eq!(result.items[0].score, 0.8);
  }

  #[test]
  fn agnostic_nms_suppresses_across_classes() {
    // 两个框 IoU 约 0.9，分别属于不同类别
    let output = output(&[
      &[100.0, 102.0],
      &[100.0, 100.0],
      &[40.0, 40.0],
      &[40.0, 40.0],
      &[0.9, 0.1],
      &[0.1, 0.8],
    ]);
    let labels = names(&["3", "8"]);
    let options = InferOptions::default().with_confidence(0.5).with_iou(0.5);

    let per_class = postprocess(&labels, &output, &unscaled(), &options).unwrap();
    let kept: Vec<&str> = per_class.iter().map(|item| item.label.as_str()).collect();
    assert_eq!(kept, vec!["3", "8"]);

    let agnostic = postprocess(
      &labels,
      &output,
      &unscaled(),
      &options.with_agnostic_nms(true),
    )
    .unwrap();
    let kept: Vec<&str> = agnostic.iter().map(|item| item.label.as_str()).collect();
    assert_eq!(kept, vec!["3"]);
  }

  #[test]
  fn boxes_are_mapped_back_through_the_letterbox() {
    // 1280x640 缩放到 640x320，上下各填充 160
    let (letterbox, _, _) = Letterbox::new(1280, 640, 640);
    let output = output(&[&[320.0], &[320.0], &[100.0], &[50.0], &[0.9]]);

    let result = postprocess(&names(&["truck"]), &output, &letterbox, &InferOptions::default()).unwrap();
    assert_eq!(result.items[0].bbox, [540.0, 270.0, 740.0, 370.0]);
  }

  #[test]
  fn unexpected_output_shape_is_rejected() {
    let labels = names(&["truck"]);
    let options = InferOptions::default();

    let no_classes = output(&[&[1.0], &[1.0], &[1.0], &[1.0]]);
    assert!(matches!(
      postprocess(&labels, &no_classes, &unscaled(), &options),
      Err(YoloError::OutputShape(shape)) if shape == vec![1, 4, 1]
    ));

    let flat = tract_ndarray::Array2::<f32>::zeros((5, 3)).into_tensor();
    assert!(matches!(
      postprocess(&labels, &flat, &unscaled(), &options),
      Err(YoloError::OutputShape(_))
    ));
  }

  #[test]
  fn label_count_must_match_classes() {
    let output = output(&[&[1.0], &[1.0], &[1.0], &[1.0], &[0.9], &[0.1]]);
    assert!(matches!(
      postprocess(
        &names(&["truck", "other-vehicles", "bus"]),
        &output,
        &unscaled(),
        &InferOptions::default()
      ),
      Err(YoloError::LabelMismatch {
        classes: 2,
        labels: 3
      })
    ));
  }
}
