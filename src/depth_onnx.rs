//! ONNX Runtime backend for the encoder and decoder.
//!
//! Exported graphs use fixed tensor names: the encoder takes `input` and emits
//! `feat0`..`feat4`, the decoder takes `feat0`..`feat4` and emits one `disp{scale}`
//! per entry of its metadata `scales`.

use crate::config::Device;
use crate::error::{DepthError, DepthResult, ModelLoadError};
use crate::model::ModelFiles;
use crate::network::{Decoder, DecoderWeights, DisparityScales, Encoder, EncoderWeights};
use ndarray::{Array4, Ix4};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionOutputs};
use ort::value::{DynValue, Tensor};
use std::path::Path;

const FEATURE_LEVELS: usize = 5;

fn build_session(model_path: &Path, device: Device) -> DepthResult<Session> {
	let mut builder = Session::builder()
		.map_err(|e| DepthError::Configuration(format!("Failed to create session: {}", e)))?
		.with_optimization_level(GraphOptimizationLevel::Level3)
		.map_err(|e| DepthError::Configuration(format!("Failed to set opt level: {}", e)))?
		.with_intra_threads(4)
		.map_err(|e| DepthError::Configuration(format!("Failed to set threads: {}", e)))?;

	if device == Device::Accelerated {
		// CUDA only, no CPU provider after it.
		builder = builder
			.with_execution_providers([CUDAExecutionProvider::default().build().error_on_failure()])
			.map_err(|e| {
				tracing::error!("CUDA execution provider unavailable: {}", e);
				DepthError::ModelLoad(ModelLoadError::DeviceMismatch {
					component: "onnx runtime",
					expected: Device::Accelerated,
					actual: Device::Cpu,
				})
			})?;
	}

	builder.commit_from_file(model_path).map_err(|e| {
		DepthError::Configuration(format!("Failed to load ONNX model {:?}: {}", model_path, e))
	})
}

fn to_value(array: &Array4<f32>) -> DepthResult<DynValue> {
	let s = array.shape();
	let shape = [s[0], s[1], s[2], s[3]];
	let data: Vec<f32> = array.iter().copied().collect();
	Tensor::from_array((shape, data))
		.map(|v| v.into_dyn())
		.map_err(|e| DepthError::Inference(format!("Failed to create input: {}", e)))
}

fn extract_4d(outputs: &SessionOutputs, name: &str) -> DepthResult<Array4<f32>> {
	let output = outputs
		.get(name)
		.ok_or_else(|| DepthError::Inference(format!("Output '{}' not found", name)))?;

	let view = output
		.try_extract_array::<f32>()
		.map_err(|e| DepthError::Inference(format!("Failed to extract '{}': {}", name, e)))?;

	view.to_owned()
		.into_dimensionality::<Ix4>()
		.map_err(|e| DepthError::Inference(format!("Output '{}' is not 4D: {}", name, e)))
}

pub struct OnnxEncoder {
	session: Session,
	device: Device,
}

impl OnnxEncoder {
	pub fn new(model_path: &Path, device: Device) -> DepthResult<Self> {
		let session = build_session(model_path, device)?;
		Ok(Self { session, device })
	}
}

impl Encoder for OnnxEncoder {
	fn device(&self) -> Device {
		self.device
	}

	fn forward(&mut self, input: &Array4<f32>) -> DepthResult<Vec<Array4<f32>>> {
		let input_value = to_value(input)?;
		let outputs = self
			.session
			.run(ort::inputs!["input" => input_value])
			.map_err(|e| DepthError::Inference(format!("Encoder inference failed: {}", e)))?;

		(0..FEATURE_LEVELS)
			.map(|i| extract_4d(&outputs, &format!("feat{}", i)))
			.collect()
	}
}

pub struct OnnxDecoder {
	session: Session,
	device: Device,
	scales: Vec<usize>,
}

impl OnnxDecoder {
	pub fn new(model_path: &Path, device: Device, scales: Vec<usize>) -> DepthResult<Self> {
		let session = build_session(model_path, device)?;
		Ok(Self {
			session,
			device,
			scales,
		})
	}
}

impl Decoder for OnnxDecoder {
	fn device(&self) -> Device {
		self.device
	}

	fn forward(&mut self, features: &[Array4<f32>]) -> DepthResult<DisparityScales> {
		if features.len() != FEATURE_LEVELS {
			return Err(DepthError::Inference(format!(
				"Decoder expects {} feature levels, got {}",
				FEATURE_LEVELS,
				features.len()
			)));
		}

		let outputs = self
			.session
			.run(ort::inputs![
				"feat0" => to_value(&features[0])?,
				"feat1" => to_value(&features[1])?,
				"feat2" => to_value(&features[2])?,
				"feat3" => to_value(&features[3])?,
				"feat4" => to_value(&features[4])?,
			])
			.map_err(|e| DepthError::Inference(format!("Decoder inference failed: {}", e)))?;

		let mut scales = DisparityScales::new();
		for &scale in &self.scales {
			scales.insert(scale, extract_4d(&outputs, &format!("disp{}", scale))?);
		}
		Ok(scales)
	}
}

/// Builds both halves of a model from its resolved directory.
pub fn load_onnx_weights(
	files: &ModelFiles,
	device: Device,
) -> DepthResult<(EncoderWeights, DecoderWeights)> {
	let encoder_meta = files.encoder_metadata()?;
	let decoder_meta = files.decoder_metadata()?;

	if encoder_meta.num_ch_enc.len() != FEATURE_LEVELS {
		return Err(DepthError::ModelLoad(ModelLoadError::IncompatibleWeights {
			encoder: encoder_meta.num_ch_enc,
			decoder: decoder_meta.num_ch_enc,
		}));
	}

	tracing::info!("   Loading pretrained encoder");
	let encoder = OnnxEncoder::new(&files.encoder_weights(), device)?;
	tracing::info!("   Loading pretrained decoder");
	let decoder = OnnxDecoder::new(&files.decoder_weights(), device, decoder_meta.scales.clone())?;

	Ok((
		EncoderWeights {
			network: Box::new(encoder),
			metadata: encoder_meta,
		},
		DecoderWeights {
			network: Box::new(decoder),
			metadata: decoder_meta,
		},
	))
}
