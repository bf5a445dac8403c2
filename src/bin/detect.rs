// 该文件是 Kamyon （卡车车牌识别） 项目的一部分。
// src/bin/detect.rs - 卡车车牌识别命令行程序
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

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tracing::{error, info};
use url::Url;

use kamyon::{
  Detect, FromUrl, Pipeline,
  input::ImageFileInput,
  model::YoloOnnxBuilder,
  record::DirectoryRecorder,
  task::{BatchTask, Task},
};

/// Kamyon 卡车车牌识别
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 车辆检测模型，例如 onnx:///models/truck.onnx?labels=/models/truck.txt
  #[arg(long, value_name = "MODEL")]
  pub vehicle_model: Url,
  /// 车牌检测模型
  #[arg(long, value_name = "MODEL")]
  pub plate_model: Url,
  /// 字符检测模型
  #[arg(long, value_name = "MODEL")]
  pub ocr_model: Url,
  /// 输入图像，例如 image:///data/truck.jpg，可以给出多个
  #[arg(long, value_name = "SOURCE", required = true, num_args = 1..)]
  pub input: Vec<Url>,
  /// 记录输入图像与车牌裁剪图的目录，例如 folder:///var/lib/kamyon
  #[arg(long, value_name = "OUTPUT")]
  pub record: Option<Url>,
  /// 工作线程数
  #[arg(long, default_value = "1", value_name = "COUNT")]
  pub workers: usize,
}

fn run<D: Detect + Sync>(detector: &D, args: &Args) -> Result<()> {
  let inputs = args
    .input
    .iter()
    .map(|url| ImageFileInput::from_url(url).with_context(|| format!("无法读取输入图像: {}", url)))
    .collect::<Result<Vec<_>>>()?;

  let results = BatchTask::default()
    .with_workers(args.workers)
    .run_task(inputs.into_iter().flatten(), detector)?;

  let mut failures = 0;
  for (url, result) in args.input.iter().zip(results) {
    match result {
      Ok(result) => println!("{}", result),
      Err(e) => {
        error!("{} 检测失败: {}", url, e);
        println!("{}", json!({ "error": e.to_string() }));
        failures += 1;
      }
    }
  }

  if failures > 0 {
    anyhow::bail!("{} 张图像检测失败", failures);
  }
  Ok(())
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  info!("车辆检测模型: {}", args.vehicle_model);
  info!("车牌检测模型: {}", args.plate_model);
  info!("字符检测模型: {}", args.ocr_model);
  info!("输入来源: {} 个", args.input.len());

  let vehicle_model = YoloOnnxBuilder::from_url(&args.vehicle_model)?.build()?;
  let plate_model = YoloOnnxBuilder::from_url(&args.plate_model)?.build()?;
  let ocr_model = YoloOnnxBuilder::from_url(&args.ocr_model)?.build()?;
  let pipeline = Pipeline::new(vehicle_model, plate_model, ocr_model);

  match &args.record {
    Some(url) => {
      info!("记录目录: {}", url);
      let recorder = DirectoryRecorder::from_url(url)?;
      run(&pipeline.with_recorder(recorder), &args)
    }
    None => run(&pipeline, &args),
  }
}
