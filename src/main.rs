use anyhow::Context;
use clap::Parser;
use monodepth_infer::{Device, ImageEncoding, InferenceConfig, InputSource, ModelName};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "monodepth-infer")]
#[command(about = "Predict disparity, depth and colorized maps for a batch of images")]
#[command(version)]
struct Cli {
	/// Image list file (one relative path per line) or a directory of images
	input: Option<PathBuf>,

	/// JSON config file; flags given on the command line override it
	#[arg(long)]
	config: Option<PathBuf>,

	/// Name of a pretrained model, e.g. mono+stereo_640x192
	#[arg(long)]
	model_name: Option<ModelName>,

	/// Directory that list entries are relative to (defaults to the list's directory)
	#[arg(long)]
	image_root: Option<PathBuf>,

	/// Base directory for run outputs
	#[arg(short, long)]
	output_dir: Option<PathBuf>,

	/// Directory holding one sub-directory of weights per model
	#[arg(long)]
	models_dir: Option<PathBuf>,

	/// Compute device: cpu or accelerated
	#[arg(long)]
	device: Option<Device>,

	/// Disables the accelerator, same as --device cpu
	#[arg(long)]
	no_cuda: bool,

	/// Predict metric depth (only meaningful for stereo-trained models)
	#[arg(long)]
	pred_metric_depth: bool,

	/// Also write a .npy per image
	#[arg(long)]
	save_arrays: bool,

	/// Write visualizations as JPEG with this quality instead of PNG
	#[arg(long)]
	jpeg_quality: Option<u8>,

	/// Hide the progress bar
	#[arg(long)]
	no_progress: bool,
}

impl Cli {
	fn into_config(self) -> anyhow::Result<InferenceConfig> {
		let mut config = match &self.config {
			Some(path) => InferenceConfig::from_json_file(path)?,
			None => InferenceConfig::default(),
		};

		if let Some(input) = self.input {
			config.input = Some(InputSource::from_path(input));
		}
		if let Some(model) = self.model_name {
			config.model_name = Some(model);
		}
		if self.image_root.is_some() {
			config.image_root = self.image_root;
		}
		if let Some(dir) = self.output_dir {
			config.output_dir = dir;
		}
		if self.models_dir.is_some() {
			config.models_dir = self.models_dir;
		}
		if let Some(device) = self.device {
			config.device = device;
		}
		if self.no_cuda {
			config.device = Device::Cpu;
		}
		if self.pred_metric_depth {
			config.metric_depth = true;
		}
		if self.save_arrays {
			config.save_per_image_arrays = true;
		}
		if let Some(quality) = self.jpeg_quality {
			config.image_format = ImageEncoding::Jpeg {
				quality: quality.clamp(1, 100),
			};
		}
		if self.no_progress {
			config.show_progress = false;
		}

		Ok(config)
	}
}

fn main() -> anyhow::Result<()> {
	monodepth_infer::logging::init_tracing()?;

	let config = Cli::parse().into_config()?;
	let summary = monodepth_infer::run(&config).context("inference run failed")?;

	eprintln!("✓ {} predictions saved to: {:?}", summary.images, summary.run_dir);
	Ok(())
}
