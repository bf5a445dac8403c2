// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/task.rs - 任务执行
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

use std::sync::Mutex;
use std::thread;

use image::RgbImage;
use tracing::{debug, info};

use crate::{
  pipeline::{Detect, PipelineError},
  result::PipelineResult,
};

pub trait Task<I, D>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, detector: &D) -> Result<Self::Output, Self::Error>;
}

/// 只处理输入中的第一张图像
pub struct OneShotTask;

impl<I, D> Task<I, D> for OneShotTask
where
  I: Iterator<Item = RgbImage>,
  D: Detect,
{
  type Output = PipelineResult;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, detector: &D) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let image = input.next().ok_or_else(|| anyhow::anyhow!("没有输入图像"))?;
    info!("输入图像获取成功，开始推理...");
    let now = std::time::Instant::now();
    let result = detector.detect(&image)?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());
    Ok(result)
  }
}

/// 多个工作线程共享同一条流水线处理一批图像。
///
/// 单张图像的检测失败只影响它自己的结果；输出顺序与输入顺序一致。
#[derive(Debug, Clone, Copy)]
pub struct BatchTask {
  workers: usize,
}

impl Default for BatchTask {
  fn default() -> Self {
    Self { workers: 1 }
  }
}

impl BatchTask {
  pub fn with_workers(mut self, workers: usize) -> Self {
    self.workers = workers.max(1);
    self
  }
}

pub type BatchOutput = Vec<Result<PipelineResult, PipelineError>>;

impl<I, D> Task<I, D> for BatchTask
where
  I: Iterator<Item = RgbImage> + Send,
  D: Detect + Sync,
{
  type Output = BatchOutput;
  type Error = anyhow::Error;

  fn run_task(self, input: I, detector: &D) -> Result<Self::Output, Self::Error> {
    info!("开始批量任务, {} 个工作线程", self.workers);
    let queue = Mutex::new(input.enumerate());
    let finished = Mutex::new(Vec::new());

    thread::scope(|scope| {
      for worker in 0..self.workers {
        let queue = &queue;
        let finished = &finished;
        scope.spawn(move || {
          loop {
            let next = match queue.lock() {
              Ok(mut queue) => queue.next(),
              Err(_) => None,
            };
            let Some((index, image)) = next else {
              break;
            };

            debug!("线程 {} 处理第 {} 张图像", worker, index);
            let now = std::time::Instant::now();
            let result = detector.detect(&image);
            debug!("第 {} 张图像完成，耗时: {:.2?}", index, now.elapsed());

            if let Ok(mut finished) = finished.lock() {
              finished.push((index, result));
            }
          }
        });
      }
    });

    let mut finished = finished
      .into_inner()
      .map_err(|_| anyhow::anyhow!("结果队列已损坏"))?;
    finished.sort_by_key(|(index, _)| *index);
    info!("批量任务完成, 共 {} 张图像", finished.len());

    Ok(finished.into_iter().map(|(_, result)| result).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  /// 按图像左上角像素的红色分量决定结果
  struct ByFirstPixel;

  impl Detect for ByFirstPixel {
    fn detect(&self, image: &RgbImage) -> Result<PipelineResult, PipelineError> {
      Ok(match image.get_pixel(0, 0)[0] {
        0 => PipelineResult::NoVehicle,
        1 => PipelineResult::OtherVehicleOnly,
        n => PipelineResult::TruckPlateRead(format!("{:02} ABC 00", n)),
      })
    }
  }

  fn image(tag: u8) -> RgbImage {
    RgbImage::from_pixel(2, 2, Rgb([tag, 0, 0]))
  }

  #[test]
  fn one_shot_uses_first_image() {
    let result = OneShotTask
      .run_task(vec![image(1), image(0)].into_iter(), &ByFirstPixel)
      .unwrap();
    assert_eq!(result, PipelineResult::OtherVehicleOnly);
  }

  #[test]
  fn one_shot_without_input_fails() {
    assert!(
      OneShotTask
        .run_task(Vec::<RgbImage>::new().into_iter(), &ByFirstPixel)
        .is_err()
    );
  }

  #[test]
  fn batch_keeps_input_order() {
    let images: Vec<RgbImage> = (0..40).map(image).collect();
    let results = BatchTask::default()
      .with_workers(4)
      .run_task(images.into_iter(), &ByFirstPixel)
      .unwrap();

    assert_eq!(results.len(), 40);
    assert_eq!(results[0].as_ref().unwrap(), &PipelineResult::NoVehicle);
    assert_eq!(results[1].as_ref().unwrap(), &PipelineResult::OtherVehicleOnly);
    for (i, result) in results.iter().enumerate().skip(2) {
      assert_eq!(
        result.as_ref().unwrap().plate(),
        Some(format!("{:02} ABC 00", i).as_str())
      );
    }
  }
}
