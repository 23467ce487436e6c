//! Encoder/decoder contracts and the bundle that pairs them.
//!
//! The pipeline never looks inside a network. Any backend that can turn an
//! [`InputTensor`] into encoder features, and features into per-scale
//! disparity, plugs in here.

use crate::config::Device;
use crate::error::{DepthError, DepthResult, ModelLoadError};
use crate::preprocess::InputTensor;
use ndarray::{Array2, Array4, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata stored alongside encoder weights.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderMetadata {
	/// Trained input height.
	pub height: Option<u32>,
	/// Trained input width.
	pub width: Option<u32>,
	/// Channel count of each feature level the encoder emits.
	pub num_ch_enc: Vec<usize>,
}

/// Metadata stored alongside decoder weights.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderMetadata {
	/// Encoder channel layout the decoder was built against.
	pub num_ch_enc: Vec<usize>,
	#[serde(default = "default_scales")]
	pub scales: Vec<usize>,
}

fn default_scales() -> Vec<usize> {
	vec![0, 1, 2, 3]
}

pub trait Encoder {
	fn device(&self) -> Device;

	/// One feature map per level, coarsening with depth.
	fn forward(&mut self, input: &Array4<f32>) -> DepthResult<Vec<Array4<f32>>>;
}

pub trait Decoder {
	fn device(&self) -> Device;

	fn forward(&mut self, features: &[Array4<f32>]) -> DepthResult<DisparityScales>;
}

/// Sigmoid disparity per output scale. Scale 0 is full feed resolution, each
/// following scale halves it.
#[derive(Debug, Clone, Default)]
pub struct DisparityScales {
	maps: BTreeMap<usize, Array4<f32>>,
}

impl DisparityScales {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, scale: usize, disp: Array4<f32>) {
		self.maps.insert(scale, disp);
	}

	/// Full-resolution map as `(height, width)`.
	pub fn finest(&self) -> DepthResult<Array2<f32>> {
		let disp = self
			.maps
			.get(&0)
			.ok_or_else(|| DepthError::Inference("Decoder produced no scale-0 disparity".to_string()))?;

		let shape = disp.shape();
		if shape[0] != 1 || shape[1] != 1 {
			return Err(DepthError::Inference(format!(
				"Expected disparity of shape (1, 1, H, W), got {:?}",
				shape
			)));
		}

		Ok(disp.index_axis(Axis(0), 0).index_axis(Axis(0), 0).to_owned())
	}
}

pub struct EncoderWeights {
	pub network: Box<dyn Encoder>,
	pub metadata: EncoderMetadata,
}

pub struct DecoderWeights {
	pub network: Box<dyn Decoder>,
	pub metadata: DecoderMetadata,
}

/// Loaded encoder and decoder on one device, with the feed resolution the
/// encoder was trained at.
pub struct ModelBundle {
	encoder: Box<dyn Encoder>,
	decoder: Box<dyn Decoder>,
	feed_height: u32,
	feed_width: u32,
	device: Device,
}

impl std::fmt::Debug for ModelBundle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModelBundle")
			.field("feed_height", &self.feed_height)
			.field("feed_width", &self.feed_width)
			.field("device", &self.device)
			.finish()
	}
}

impl ModelBundle {
	pub fn load(
		encoder: EncoderWeights,
		decoder: DecoderWeights,
		device: Device,
	) -> Result<Self, ModelLoadError> {
		let feed_height = encoder
			.metadata
			.height
			.ok_or(ModelLoadError::MissingMetadata("height"))?;
		let feed_width = encoder
			.metadata
			.width
			.ok_or(ModelLoadError::MissingMetadata("width"))?;
		if feed_height == 0 || feed_width == 0 {
			return Err(ModelLoadError::MissingMetadata("height/width (zero)"));
		}

		if encoder.metadata.num_ch_enc != decoder.metadata.num_ch_enc {
			return Err(ModelLoadError::IncompatibleWeights {
				encoder: encoder.metadata.num_ch_enc,
				decoder: decoder.metadata.num_ch_enc,
			});
		}

		for (component, actual) in [
			("encoder", encoder.network.device()),
			("decoder", decoder.network.device()),
		] {
			if actual != device {
				return Err(ModelLoadError::DeviceMismatch {
					component,
					expected: device,
					actual,
				});
			}
		}

		tracing::debug!(
			"Model bundle ready: feed {}x{}, encoder channels {:?}, device {}",
			feed_width,
			feed_height,
			encoder.metadata.num_ch_enc,
			device
		);

		Ok(Self {
			encoder: encoder.network,
			decoder: decoder.network,
			feed_height,
			feed_width,
			device,
		})
	}

	pub fn feed_height(&self) -> u32 {
		self.feed_height
	}

	pub fn feed_width(&self) -> u32 {
		self.feed_width
	}

	pub fn device(&self) -> Device {
		self.device
	}

	/// Forward pass. Backends expose no training state, so nothing here can
	/// record gradients or update weights.
	pub fn infer(&mut self, input: &InputTensor) -> DepthResult<DisparityScales> {
		if input.feed_height() != self.feed_height as usize
			|| input.feed_width() != self.feed_width as usize
		{
			return Err(DepthError::Inference(format!(
				"Input is {}x{} but the model was trained at {}x{}",
				input.feed_width(),
				input.feed_height(),
				self.feed_width,
				self.feed_height
			)));
		}

		let features = self.encoder.forward(input.as_array())?;
		self.decoder.forward(&features)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::preprocess::prepare;
	use image::RgbImage;

	struct FixedEncoder(Device);

	impl Encoder for FixedEncoder {
		fn device(&self) -> Device {
			self.0
		}

		fn forward(&mut self, input: &Array4<f32>) -> DepthResult<Vec<Array4<f32>>> {
			Ok(vec![input.clone()])
		}
	}

	struct MeanDecoder(Device);

	impl Decoder for MeanDecoder {
		fn device(&self) -> Device {
			self.0
		}

		fn forward(&mut self, features: &[Array4<f32>]) -> DepthResult<DisparityScales> {
			let f = &features[0];
			let mean = f.mean_axis(Axis(1)).unwrap().insert_axis(Axis(1));
			let mut out = DisparityScales::new();
			out.insert(0, mean);
			Ok(out)
		}
	}

	fn weights(
		meta: EncoderMetadata,
		dec_channels: Vec<usize>,
		enc_device: Device,
		dec_device: Device,
	) -> (EncoderWeights, DecoderWeights) {
		(
			EncoderWeights {
				network: Box::new(FixedEncoder(enc_device)),
				metadata: meta,
			},
			DecoderWeights {
				network: Box::new(MeanDecoder(dec_device)),
				metadata: DecoderMetadata {
					num_ch_enc: dec_channels,
					scales: vec![0],
				},
			},
		)
	}

	fn meta() -> EncoderMetadata {
		EncoderMetadata {
			height: Some(2),
			width: Some(4),
			num_ch_enc: vec![3],
		}
	}

	#[test]
	fn load_and_infer() {
		let (enc, dec) = weights(meta(), vec![3], Device::Cpu, Device::Cpu);
		let mut bundle = ModelBundle::load(enc, dec, Device::Cpu).unwrap();
		assert_eq!((bundle.feed_height(), bundle.feed_width()), (2, 4));

		let img = RgbImage::from_pixel(8, 8, image::Rgb([255, 255, 255]));
		let input = prepare(&img, 2, 4).unwrap();
		let disp = bundle.infer(&input).unwrap().finest().unwrap();
		assert_eq!(disp.dim(), (2, 4));
	}

	#[test]
	fn missing_metadata() {
		let mut m = meta();
		m.width = None;
		let (enc, dec) = weights(m, vec![3], Device::Cpu, Device::Cpu);
		assert_eq!(
			ModelBundle::load(enc, dec, Device::Cpu).unwrap_err(),
			ModelLoadError::MissingMetadata("width")
		);
	}

	#[test]
	fn incompatible_channels() {
		let (enc, dec) = weights(meta(), vec![64, 64], Device::Cpu, Device::Cpu);
		assert!(matches!(
			ModelBundle::load(enc, dec, Device::Cpu),
			Err(ModelLoadError::IncompatibleWeights { .. })
		));
	}

	#[test]
	fn device_mismatch_fails_fast() {
		let (enc, dec) = weights(meta(), vec![3], Device::Cpu, Device::Accelerated);
		assert_eq!(
			ModelBundle::load(enc, dec, Device::Cpu).unwrap_err(),
			ModelLoadError::DeviceMismatch {
				component: "decoder",
				expected: Device::Cpu,
				actual: Device::Accelerated,
			}
		);
	}

	#[test]
	fn wrong_feed_size_rejected() {
		let (enc, dec) = weights(meta(), vec![3], Device::Cpu, Device::Cpu);
		let mut bundle = ModelBundle::load(enc, dec, Device::Cpu).unwrap();
		let img = RgbImage::new(4, 4);
		let input = prepare(&img, 4, 4).unwrap();
		assert!(matches!(bundle.infer(&input), Err(DepthError::Inference(_))));
	}

	#[test]
	fn finest_requires_scale_zero() {
		let mut scales = DisparityScales::new();
		scales.insert(1, Array4::zeros((1, 1, 1, 2)));
		assert!(scales.finest().is_err());
	}
}
