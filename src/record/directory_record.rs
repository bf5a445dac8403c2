// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/record/directory_record.rs - 目录记录
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
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Utc;
use image::RgbImage;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  record::{Artifact, RecordError, Recorder},
};

const INPUT_DIRECTORY: &str = "detected_images";
const PLATE_DIRECTORY: &str = "detected_plates";

/// 文件名主干 `<毫秒时间戳>_<序号>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordStem {
  pub millis: i64,
  pub id: u32,
}

impl fmt::Display for RecordStem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}_{:04}", self.millis, self.id)
  }
}

/// 把输入图像和车牌裁剪图写到目录：
/// `detected_images/input_<stem>.jpg` 与 `detected_plates/plate_<stem>.jpg`
pub struct DirectoryRecorder {
  directory: PathBuf,
  counter: AtomicU32,
}

impl FromUrlWithScheme for DirectoryRecorder {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecorder {
  type Error = RecordError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(RecordError::SchemeMismatch);
    }
    Ok(DirectoryRecorder::new(uri.path()))
  }
}

impl DirectoryRecorder {
  pub fn new(directory: impl Into<PathBuf>) -> Self {
    Self {
      directory: directory.into(),
      counter: AtomicU32::new(0),
    }
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  pub fn artifact_path(&self, stem: &RecordStem, artifact: Artifact) -> PathBuf {
    match artifact {
      Artifact::Input => self
        .directory
        .join(INPUT_DIRECTORY)
        .join(format!("input_{}.jpg", stem)),
      Artifact::Plate => self
        .directory
        .join(PLATE_DIRECTORY)
        .join(format!("plate_{}.jpg", stem)),
    }
  }
}

impl Recorder for DirectoryRecorder {
  type Key = RecordStem;

  fn begin(&self) -> Self::Key {
    RecordStem {
      millis: Utc::now().timestamp_millis(),
      id: self.counter.fetch_add(1, Ordering::Relaxed) % 10_000,
    }
  }

  fn record(&self, key: &Self::Key, artifact: Artifact, image: &RgbImage) -> Result<(), RecordError> {
    let path = self.artifact_path(key, artifact);
    if let Some(parent) = path.parent()
      && !parent.exists()
    {
      std::fs::create_dir_all(parent)?;
    }
    image.save(&path)?;
    debug!("保存图像到文件: {}", path.display());
    Ok(())
  }
}
