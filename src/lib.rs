pub mod colormap;
pub mod config;
pub mod depth;
pub mod error;
pub mod image_loader;
pub mod logging;
pub mod model;
pub mod network;
pub mod output;
pub mod preprocess;
pub mod runner;

#[cfg(feature = "onnx")]
pub mod depth_onnx;

pub use colormap::colorize;
pub use config::{Device, InferenceConfig, InputSource, ModelName};
pub use depth::{disp_to_depth, DepthBounds, STEREO_SCALE_FACTOR};
pub use error::{DepthError, DepthResult, ModelLoadError, NumericError};
pub use network::{Decoder, DecoderWeights, Encoder, EncoderWeights, ModelBundle};
pub use output::{ImageEncoding, PredictionArchive, RunDirectory};
pub use preprocess::{prepare, InputTensor};
pub use runner::{BatchRunner, RunOptions, RunSummary, Stage};

use crate::image_loader::collect_inputs;
use crate::output::check_unique_outputs;

/// Run a whole batch with already-constructed networks
///
/// Startup checks (config, depth bounds, input list, output names, weight
/// compatibility, output directory) all happen before the first image is read.
pub fn run_with_weights(
	config: &InferenceConfig,
	encoder: EncoderWeights,
	decoder: DecoderWeights,
) -> DepthResult<RunSummary> {
	let bounds = config.validate()?;
	run_validated(config, bounds, encoder, decoder)
}

fn run_validated(
	config: &InferenceConfig,
	bounds: DepthBounds,
	encoder: EncoderWeights,
	decoder: DecoderWeights,
) -> DepthResult<RunSummary> {
	let entries = collect_inputs(config.input()?, config.image_root.as_deref())?;
	check_unique_outputs(entries.iter().map(|e| e.name.as_str()), config.image_format)?;
	let model = ModelBundle::load(encoder, decoder, config.device)?;
	let run_dir = RunDirectory::create_timestamped(&config.output_dir)?;

	tracing::info!(
		"Processing {} images at {}x{} on {}, depth {}..{}, into {}",
		entries.len(),
		model.feed_width(),
		model.feed_height(),
		model.device(),
		bounds.min_depth(),
		bounds.max_depth(),
		run_dir.path().display()
	);

	let options = RunOptions {
		bounds,
		metric_depth: config.metric_depth,
		image_format: config.image_format,
		save_per_image_arrays: config.save_per_image_arrays,
		show_progress: config.show_progress,
	};
	BatchRunner::new(model, options).run(&entries, &run_dir)
}

/// Resolve the configured model, load it with ONNX Runtime and run the batch
#[cfg(feature = "onnx")]
pub fn run(config: &InferenceConfig) -> DepthResult<RunSummary> {
	let bounds = config.validate()?;
	let model_name = config.model_name()?;
	let files = model::find_model_dir(model_name, config.models_dir.as_deref())?;
	tracing::info!("-> Loading model from {}", files.dir.display());

	let (encoder, decoder) = depth_onnx::load_onnx_weights(&files, config.device)?;
	let (declared_h, declared_w) = model_name.feed_size();
	if encoder.metadata.height != Some(declared_h) || encoder.metadata.width != Some(declared_w) {
		tracing::warn!(
			"{} declares {}x{} but its encoder was trained at {:?}x{:?}; using the encoder's",
			model_name,
			declared_w,
			declared_h,
			encoder.metadata.width,
			encoder.metadata.height
		);
	}

	run_validated(config, bounds, encoder, decoder)
}
