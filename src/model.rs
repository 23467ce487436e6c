use crate::config::ModelName;
use crate::error::{DepthError, DepthResult, ModelLoadError};
use crate::network::{DecoderMetadata, EncoderMetadata};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

pub const ENCODER_WEIGHTS: &str = "encoder.onnx";
pub const DECODER_WEIGHTS: &str = "depth.onnx";
pub const ENCODER_METADATA: &str = "encoder.json";
pub const DECODER_METADATA: &str = "depth.json";

/// Files making up one pretrained model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelFiles {
	pub dir: PathBuf,
}

impl ModelFiles {
	pub fn encoder_weights(&self) -> PathBuf {
		self.dir.join(ENCODER_WEIGHTS)
	}

	pub fn decoder_weights(&self) -> PathBuf {
		self.dir.join(DECODER_WEIGHTS)
	}

	/// A missing `encoder.json` means the trained feed size is unknown.
	pub fn encoder_metadata(&self) -> DepthResult<EncoderMetadata> {
		read_metadata(&self.dir.join(ENCODER_METADATA))?.ok_or(DepthError::ModelLoad(
			ModelLoadError::MissingMetadata("height/width: encoder.json not found"),
		))
	}

	pub fn decoder_metadata(&self) -> DepthResult<DecoderMetadata> {
		let path = self.dir.join(DECODER_METADATA);
		read_metadata(&path)?.ok_or_else(|| {
			DepthError::Configuration(format!("Decoder metadata {:?} not found", path))
		})
	}
}

/// `Ok(None)` when the file does not exist.
fn read_metadata<T: DeserializeOwned>(path: &Path) -> DepthResult<Option<T>> {
	let raw = match std::fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
		Err(e) => {
			return Err(DepthError::Storage(format!(
				"Failed to read model metadata {:?}: {}",
				path, e
			)))
		}
	};
	serde_json::from_str(&raw).map(Some).map_err(|e| {
		DepthError::Configuration(format!("Malformed model metadata {:?}: {}", path, e))
	})
}

/// Find the directory holding the weights for a model
///
/// Searches in order:
/// 1. Explicit models directory, if given
/// 2. MONODEPTH_MODELS env var
/// 3. Current working directory ./models/
/// 4. User data directory
pub fn find_model_dir(model: ModelName, models_dir: Option<&Path>) -> DepthResult<ModelFiles> {
	let name = model.name();
	let mut search_paths = Vec::new();

	if let Some(dir) = models_dir {
		search_paths.push(dir.join(name));
	}
	if let Ok(env_dir) = std::env::var("MONODEPTH_MODELS") {
		search_paths.push(PathBuf::from(env_dir).join(name));
	}
	search_paths.push(PathBuf::from("models").join(name));
	if let Some(data) = dirs::data_dir() {
		search_paths.push(data.join("monodepth-infer").join("models").join(name));
	}

	for path in &search_paths {
		if path.join(ENCODER_WEIGHTS).exists() && path.join(DECODER_WEIGHTS).exists() {
			return Ok(ModelFiles { dir: path.clone() });
		}
	}

	Err(DepthError::Configuration(format!(
		"Model '{}' not found.\nSearched locations:\n{}",
		name,
		search_paths
			.iter()
			.map(|p| format!("  - {}", p.display()))
			.collect::<Vec<_>>()
			.join("\n")
	)))
}
