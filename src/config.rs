use crate::depth::DepthBounds;
use crate::error::{DepthError, DepthResult};
use crate::output::ImageEncoding;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_MIN_DEPTH: f32 = 0.1;
pub const DEFAULT_MAX_DEPTH: f32 = 100.0;

/// Compute device for the whole run. Chosen once at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
	#[default]
	Cpu,
	Accelerated,
}

impl fmt::Display for Device {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Device::Cpu => write!(f, "cpu"),
			Device::Accelerated => write!(f, "accelerated"),
		}
	}
}

impl FromStr for Device {
	type Err = DepthError;

	fn from_str(s: &str) -> DepthResult<Self> {
		match s.to_lowercase().as_str() {
			"cpu" => Ok(Device::Cpu),
			"accelerated" | "gpu" | "cuda" => Ok(Device::Accelerated),
			other => Err(DepthError::Configuration(format!(
				"Unknown device '{}'. Use: cpu or accelerated",
				other
			))),
		}
	}
}

/// Published pretrained weight sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelName {
	Mono640x192,
	Stereo640x192,
	MonoStereo640x192,
	MonoNoPt640x192,
	StereoNoPt640x192,
	MonoStereoNoPt640x192,
	Mono1024x320,
	Stereo1024x320,
	MonoStereo1024x320,
}

impl ModelName {
	pub const ALL: [ModelName; 9] = [
		ModelName::Mono640x192,
		ModelName::Stereo640x192,
		ModelName::MonoStereo640x192,
		ModelName::MonoNoPt640x192,
		ModelName::StereoNoPt640x192,
		ModelName::MonoStereoNoPt640x192,
		ModelName::Mono1024x320,
		ModelName::Stereo1024x320,
		ModelName::MonoStereo1024x320,
	];

	pub fn name(&self) -> &'static str {
		match self {
			ModelName::Mono640x192 => "mono_640x192",
			ModelName::Stereo640x192 => "stereo_640x192",
			ModelName::MonoStereo640x192 => "mono+stereo_640x192",
			ModelName::MonoNoPt640x192 => "mono_no_pt_640x192",
			ModelName::StereoNoPt640x192 => "stereo_no_pt_640x192",
			ModelName::MonoStereoNoPt640x192 => "mono+stereo_no_pt_640x192",
			ModelName::Mono1024x320 => "mono_1024x320",
			ModelName::Stereo1024x320 => "stereo_1024x320",
			ModelName::MonoStereo1024x320 => "mono+stereo_1024x320",
		}
	}

	/// Declared feed resolution as `(height, width)`.
	pub fn feed_size(&self) -> (u32, u32) {
		match self {
			ModelName::Mono1024x320 | ModelName::Stereo1024x320 | ModelName::MonoStereo1024x320 => {
				(320, 1024)
			}
			_ => (192, 640),
		}
	}

	/// Whether the weights saw stereo supervision, which is what makes the
	/// metric scale factor meaningful.
	pub fn is_stereo_trained(&self) -> bool {
		self.name().contains("stereo")
	}
}

impl fmt::Display for ModelName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

impl FromStr for ModelName {
	type Err = DepthError;

	fn from_str(s: &str) -> DepthResult<Self> {
		ModelName::ALL
			.iter()
			.copied()
			.find(|m| m.name() == s)
			.ok_or_else(|| {
				DepthError::Configuration(format!(
					"Unknown model '{}'. Choose one of: {}",
					s,
					ModelName::ALL.iter().map(|m| m.name()).collect::<Vec<_>>().join(", ")
				))
			})
	}
}

impl TryFrom<String> for ModelName {
	type Error = DepthError;

	fn try_from(value: String) -> DepthResult<Self> {
		value.parse()
	}
}

impl From<ModelName> for String {
	fn from(value: ModelName) -> Self {
		value.name().to_string()
	}
}

/// Where the images of a run come from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
	/// Text file with one image path per line, relative to the image root.
	ListFile(PathBuf),
	/// Every supported image directly inside a directory.
	Directory(PathBuf),
}

impl InputSource {
	/// Picks the variant from what exists on disk.
	pub fn from_path(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		if path.is_dir() {
			InputSource::Directory(path)
		} else {
			InputSource::ListFile(path)
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
	pub model_name: Option<ModelName>,
	pub device: Device,
	pub metric_depth: bool,
	pub input: Option<InputSource>,
	/// Prefix joined onto every list entry. Defaults to the list file's directory.
	pub image_root: Option<PathBuf>,
	pub output_dir: PathBuf,
	pub models_dir: Option<PathBuf>,
	pub min_depth: f32,
	pub max_depth: f32,
	pub image_format: ImageEncoding,
	pub save_per_image_arrays: bool,
	pub show_progress: bool,
}

impl Default for InferenceConfig {
	fn default() -> Self {
		Self {
			model_name: None,
			device: Device::Cpu,
			metric_depth: false,
			input: None,
			image_root: None,
			output_dir: PathBuf::from("results"),
			models_dir: None,
			min_depth: DEFAULT_MIN_DEPTH,
			max_depth: DEFAULT_MAX_DEPTH,
			image_format: ImageEncoding::Png,
			save_per_image_arrays: false,
			show_progress: true,
		}
	}
}

impl InferenceConfig {
	pub fn from_json_file(path: impl AsRef<Path>) -> DepthResult<Self> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path).map_err(|e| {
			DepthError::Configuration(format!("Failed to read config {:?}: {}", path, e))
		})?;
		serde_json::from_str(&raw).map_err(|e| {
			DepthError::Configuration(format!("Failed to parse config {:?}: {}", path, e))
		})
	}

	pub fn model_name(&self) -> DepthResult<ModelName> {
		self.model_name.ok_or_else(|| {
			DepthError::Configuration(
				"No model specified; set model_name (e.g. mono+stereo_640x192)".to_string(),
			)
		})
	}

	pub fn input(&self) -> DepthResult<&InputSource> {
		self.input
			.as_ref()
			.ok_or_else(|| DepthError::Configuration("No input list or directory given".to_string()))
	}

	/// Startup checks. Everything here fails before a model is loaded or an
	/// image is read.
	pub fn validate(&self) -> DepthResult<DepthBounds> {
		let model = self.model_name()?;
		self.input()?;
		let bounds = DepthBounds::new(self.min_depth, self.max_depth)?;

		if self.metric_depth && !model.is_stereo_trained() {
			tracing::warn!(
				"Metric depth only makes sense for stereo-trained models; outputs of {} will not be in metric space",
				model
			);
		}

		Ok(bounds)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_every_published_model() {
		for model in ModelName::ALL {
			assert_eq!(model.name().parse::<ModelName>().unwrap(), model);
		}
		assert!(matches!(
			"mono_9999x1".parse::<ModelName>(),
			Err(DepthError::Configuration(_))
		));
	}

	#[test]
	fn feed_size_and_supervision() {
		assert_eq!(ModelName::Mono1024x320.feed_size(), (320, 1024));
		assert_eq!(ModelName::MonoStereoNoPt640x192.feed_size(), (192, 640));
		assert!(ModelName::MonoStereo640x192.is_stereo_trained());
		assert!(!ModelName::MonoNoPt640x192.is_stereo_trained());
	}

	#[test]
	fn device_names() {
		assert_eq!("CUDA".parse::<Device>().unwrap(), Device::Accelerated);
		assert_eq!("cpu".parse::<Device>().unwrap(), Device::Cpu);
		assert!("tpu".parse::<Device>().is_err());
	}

	#[test]
	fn json_config_with_defaults() {
		let cfg: InferenceConfig = serde_json::from_str(
			r#"{"model_name": "stereo_640x192", "device": "accelerated", "input": {"list_file": "val.txt"}}"#,
		)
		.unwrap();
		assert_eq!(cfg.model_name, Some(ModelName::Stereo640x192));
		assert_eq!(cfg.device, Device::Accelerated);
		assert_eq!(cfg.input, Some(InputSource::ListFile(PathBuf::from("val.txt"))));
		assert_eq!(cfg.min_depth, DEFAULT_MIN_DEPTH);
		assert_eq!(cfg.max_depth, DEFAULT_MAX_DEPTH);

		assert!(serde_json::from_str::<InferenceConfig>(r#"{"model_name": "bogus"}"#).is_err());
	}

	#[test]
	fn validate_rejects_missing_model_and_bad_bounds() {
		let mut cfg = InferenceConfig::default();
		cfg.input = Some(InputSource::ListFile(PathBuf::from("list.txt")));
		assert!(matches!(cfg.validate(), Err(DepthError::Configuration(_))));

		cfg.model_name = Some(ModelName::Mono640x192);
		assert!(cfg.validate().is_ok());

		cfg.min_depth = 0.0;
		assert!(matches!(cfg.validate(), Err(DepthError::Numeric(_))));

		cfg.min_depth = 10.0;
		cfg.max_depth = 10.0;
		assert!(matches!(cfg.validate(), Err(DepthError::Numeric(_))));
	}
}
