//! Sequential driver over an ordered image list.
//!
//! Each image moves through `Pending -> Preprocessing -> Inferring ->
//! Postprocessing -> Written` before the next one is read. The first failure
//! ends the run; nothing is skipped.

use crate::colormap::colorize;
use crate::depth::{to_metric_depth, DepthBounds};
use crate::error::DepthResult;
use crate::image_loader::{load_image, ImageEntry};
use crate::network::ModelBundle;
use crate::output::{save_array, save_image, ImageEncoding, PredictionArchive, RunDirectory};
use crate::preprocess::{prepare, resize_disparity};
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::Array2;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
	Pending,
	Preprocessing,
	Inferring,
	Postprocessing,
	Written,
	Done,
}

#[derive(Clone, Copy, Debug)]
pub struct RunOptions {
	pub bounds: DepthBounds,
	pub metric_depth: bool,
	pub image_format: ImageEncoding,
	pub save_per_image_arrays: bool,
	pub show_progress: bool,
}

/// Everything derived from one image, at the image's own resolution.
#[derive(Debug, Clone)]
pub struct ImagePrediction {
	/// Sigmoid disparity after resizing back to source resolution.
	pub disparity: Array2<f32>,
	pub scaled_disparity: Array2<f32>,
	/// Depth, already multiplied by the stereo scale in metric mode.
	pub depth: Array2<f32>,
	pub visualization: RgbImage,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
	pub run_dir: PathBuf,
	pub archive_path: PathBuf,
	pub dump_path: PathBuf,
	pub images: usize,
}

pub struct BatchRunner {
	model: ModelBundle,
	options: RunOptions,
	stage: Stage,
}

impl BatchRunner {
	pub fn new(model: ModelBundle, options: RunOptions) -> Self {
		Self {
			model,
			options,
			stage: Stage::Pending,
		}
	}

	pub fn stage(&self) -> Stage {
		self.stage
	}

	/// Runs one decoded image through the network and post-processing.
	pub fn predict(&mut self, image: &RgbImage) -> DepthResult<ImagePrediction> {
		let (original_width, original_height) = image.dimensions();

		self.stage = Stage::Preprocessing;
		let input = prepare(image, self.model.feed_height(), self.model.feed_width())?;

		self.stage = Stage::Inferring;
		let outputs = self.model.infer(&input)?;
		let disp = outputs.finest()?;

		self.stage = Stage::Postprocessing;
		let disparity = resize_disparity(&disp, original_height, original_width)?;
		let (scaled_disparity, depth) = self.options.bounds.convert(&disparity);
		let depth = if self.options.metric_depth {
			to_metric_depth(&depth)
		} else {
			depth
		};
		let visualization = colorize(&disparity);

		Ok(ImagePrediction {
			disparity,
			scaled_disparity,
			depth,
			visualization,
		})
	}

	fn write(&self, entry: &ImageEntry, pred: &ImagePrediction, out: &RunDirectory) -> DepthResult<PathBuf> {
		let vis_path = out.visualization_path(&entry.name, self.options.image_format);
		save_image(&pred.visualization, &vis_path, self.options.image_format)?;

		if self.options.save_per_image_arrays {
			if self.options.metric_depth {
				save_array(&pred.depth, &out.array_path(&entry.name, "depth"))?;
			} else {
				save_array(&pred.scaled_disparity, &out.array_path(&entry.name, "disp"))?;
			}
		}

		Ok(vis_path)
	}

	/// Processes every entry in order, then writes the archive once.
	pub fn run(&mut self, entries: &[ImageEntry], out: &RunDirectory) -> DepthResult<RunSummary> {
		let progress = if self.options.show_progress {
			let bar = ProgressBar::new(entries.len() as u64);
			bar.set_style(
				ProgressStyle::default_bar()
					.template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images ({eta})")
					.unwrap_or_else(|_| ProgressStyle::default_bar())
					.progress_chars("=>-"),
			);
			bar
		} else {
			ProgressBar::hidden()
		};

		let mut archive = PredictionArchive::new();

		for entry in entries {
			self.stage = Stage::Pending;
			let image = load_image(&entry.path)?;
			let pred = self.predict(&image)?;
			let vis_path = self.write(entry, &pred, out)?;
			self.stage = Stage::Written;

			progress.suspend(|| tracing::info!("{} -> {}", entry.name, vis_path.display()));
			archive.push(pred.scaled_disparity);
			progress.inc(1);
		}
		progress.finish_and_clear();

		if archive.is_empty() {
			tracing::warn!("No images were processed; writing an empty archive");
		}

		let (archive_path, dump_path) = archive.persist(out)?;
		self.stage = Stage::Done;

		tracing::info!(
			"-> Done! {} predictions written to {}",
			archive.len(),
			archive_path.display()
		);

		Ok(RunSummary {
			run_dir: out.path().to_path_buf(),
			archive_path,
			dump_path,
			images: archive.len(),
		})
	}
}
